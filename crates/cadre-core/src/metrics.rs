#![forbid(unsafe_code)]

//! Running performance counters and their immutable snapshot.
//!
//! [`Counters`] is the scheduler-owned mutable aggregate; [`MetricsSnapshot`]
//! is the copy handed to observers. `clear()` on the scheduler never touches
//! counters — resetting them is a separate, explicit operation.

use std::time::Duration;

/// Immutable copy of the counters at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Cycles that executed at least one operation.
    pub cycles_run: u64,
    /// Cumulative operations executed (batch sizes summed, failures
    /// included — a failed op still consumed its batch slot).
    pub ops_executed: u64,
    /// Cumulative submissions absorbed by coalescing.
    pub ops_coalesced: u64,
    /// Wall-clock execution duration of the most recent cycle.
    pub last_cycle: Duration,
    /// Running average batch size: `ops_executed / cycles_run`, zero
    /// before the first cycle.
    pub average_batch_size: f64,
}

/// Scheduler-owned running counters.
#[derive(Clone, Debug, Default)]
pub struct Counters {
    cycles_run: u64,
    ops_executed: u64,
    ops_coalesced: u64,
    last_cycle: Duration,
}

impl Counters {
    /// Fresh, zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed cycle.
    pub fn record_cycle(&mut self, batch_len: usize, duration: Duration) {
        self.cycles_run += 1;
        self.ops_executed += batch_len as u64;
        self.last_cycle = duration;
    }

    /// Record one submission absorbed by coalescing.
    pub fn record_coalesce(&mut self) {
        self.ops_coalesced += 1;
    }

    /// Zero everything. Explicit — never implied by clearing pending work.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy out the current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let average_batch_size = if self.cycles_run == 0 {
            0.0
        } else {
            self.ops_executed as f64 / self.cycles_run as f64
        };
        MetricsSnapshot {
            cycles_run: self.cycles_run,
            ops_executed: self.ops_executed,
            ops_coalesced: self.ops_coalesced,
            last_cycle: self.last_cycle,
            average_batch_size,
        }
    }
}
