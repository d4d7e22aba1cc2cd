#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! All knobs are optional with defaults matching a 60 Hz surface: a
//! 50-operation batch cap and a 16 ms cadence hint.

use std::time::Duration;

/// Construction-time scheduler options.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Cap on operations executed per cycle. Bounds worst-case per-frame
    /// cost; the remainder waits for the next cycle.
    pub max_batch_size: usize,
    /// Target cycle cadence hint. The actual cadence follows whatever
    /// frame clock drives the pump; `IntervalClock::from_config` uses this
    /// as its period.
    pub batch_timeout: Duration,
    /// Rank visible targets ahead of not-visible ones within a priority
    /// class.
    pub prioritize_visible: bool,
    /// Coalesce same-id submissions. When off, a same-id submit still
    /// replaces the pending entry (last write wins) but is not counted as
    /// a dedup.
    pub enable_deduplication: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            batch_timeout: Duration::from_millis(16),
            prioritize_visible: true,
            enable_deduplication: true,
        }
    }
}

impl SchedulerConfig {
    /// Set the per-cycle batch cap.
    #[must_use]
    pub const fn with_max_batch_size(mut self, cap: usize) -> Self {
        self.max_batch_size = cap;
        self
    }

    /// Set the cadence hint.
    #[must_use]
    pub const fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Enable or disable visibility as a secondary sort key.
    #[must_use]
    pub const fn with_prioritize_visible(mut self, on: bool) -> Self {
        self.prioritize_visible = on;
        self
    }

    /// Enable or disable same-id coalescing.
    #[must_use]
    pub const fn with_deduplication(mut self, on: bool) -> Self {
        self.enable_deduplication = on;
        self
    }
}
