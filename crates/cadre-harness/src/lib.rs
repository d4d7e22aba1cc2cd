#![forbid(unsafe_code)]

//! Deterministic synthetic-load harness for the Cadre scheduler.
//!
//! [`run_stress`] drives a scheduler through waves of batched-value writes
//! (with visibility churn on the side) on a virtual clock, then verifies
//! the accounting invariants that must hold for any run:
//!
//! - every submission is either executed or absorbed by coalescing,
//! - the sum of final cell values equals the executed-operation count
//!   (each execution applies exactly one `+1`),
//! - `average_batch_size × cycles_run == ops_executed`,
//! - the backlog fully drains within the frame budget.
//!
//! The load pattern is deterministic (round-robin item selection, fixed
//! priority mix, fixed viewport scroll), so failures reproduce exactly.

use core::fmt;

use cadre_core::config::SchedulerConfig;
use cadre_core::geometry::Rect;
use cadre_core::metrics::MetricsSnapshot;
use cadre_core::op::Priority;
use cadre_runtime::handle::BatchedValue;
use cadre_runtime::pump::{FramePump, ManualClock};
use cadre_runtime::scheduler::Scheduler;
use cadre_runtime::visibility::VisibilityTracker;

/// Shape of a stress run.
#[derive(Clone, Debug)]
pub struct StressConfig {
    /// Number of batched value cells under load.
    pub items: usize,
    /// Load waves to apply.
    pub waves: usize,
    /// Items touched per wave (round-robin over all items).
    pub items_per_wave: usize,
    /// Writes applied to each touched item per wave.
    pub sets_per_item: usize,
    /// Frames pumped between waves.
    pub frames_between_waves: usize,
    /// Frame budget for the final drain.
    pub drain_frames: usize,
    /// Scheduler under test.
    pub scheduler: SchedulerConfig,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            items: 25,
            waves: 40,
            items_per_wave: 10,
            sets_per_item: 4,
            frames_between_waves: 1,
            drain_frames: 240,
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Outcome of a stress run.
#[derive(Clone, Debug, serde::Serialize)]
pub struct StressReport {
    /// Whether the run had deduplication enabled. The submission identity
    /// (`executed + coalesced == submits`) only holds when it was.
    pub dedup: bool,
    /// Total write submissions issued.
    pub submits: u64,
    /// Frames consumed (waves plus drain).
    pub frames: usize,
    /// Sum of all final cell values.
    pub value_sum: u64,
    /// Operations left pending after the drain budget (zero on success).
    pub pending_after_drain: usize,
    /// Final counters.
    pub metrics: MetricsSnapshot,
}

/// An accounting invariant that did not hold.
#[derive(Clone, Debug, PartialEq)]
pub enum StressViolation {
    /// `ops_executed + ops_coalesced` diverged from total submissions.
    LostSubmissions {
        /// Submissions issued.
        submits: u64,
        /// Operations executed.
        executed: u64,
        /// Submissions absorbed by coalescing.
        coalesced: u64,
    },
    /// Cell values drifted from the executed-operation count.
    ValueDrift {
        /// Operations executed.
        executed: u64,
        /// Sum of final cell values.
        value_sum: u64,
    },
    /// The derived average disagrees with the raw counters.
    AverageInconsistent {
        /// Cycles run.
        cycles: u64,
        /// Operations executed.
        executed: u64,
        /// Reported running average.
        average: f64,
    },
    /// Work was still pending after the drain budget.
    BacklogNotDrained {
        /// Operations left pending.
        pending: usize,
    },
}

impl fmt::Display for StressViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LostSubmissions {
                submits,
                executed,
                coalesced,
            } => write!(
                f,
                "lost submissions: {submits} submitted, {executed} executed + {coalesced} coalesced"
            ),
            Self::ValueDrift {
                executed,
                value_sum,
            } => write!(
                f,
                "value drift: {executed} executions but cells sum to {value_sum}"
            ),
            Self::AverageInconsistent {
                cycles,
                executed,
                average,
            } => write!(
                f,
                "average batch size {average} inconsistent with {executed} ops over {cycles} cycles"
            ),
            Self::BacklogNotDrained { pending } => {
                write!(f, "backlog not drained: {pending} ops still pending")
            }
        }
    }
}

impl std::error::Error for StressViolation {}

impl StressReport {
    /// Check every accounting invariant.
    pub fn verify(&self) -> Result<(), StressViolation> {
        let m = &self.metrics;
        if self.dedup && m.ops_executed + m.ops_coalesced != self.submits {
            return Err(StressViolation::LostSubmissions {
                submits: self.submits,
                executed: m.ops_executed,
                coalesced: m.ops_coalesced,
            });
        }
        if self.value_sum != m.ops_executed {
            return Err(StressViolation::ValueDrift {
                executed: m.ops_executed,
                value_sum: self.value_sum,
            });
        }
        if m.cycles_run > 0 {
            let implied = m.average_batch_size * m.cycles_run as f64;
            if (implied - m.ops_executed as f64).abs() > 1e-6 {
                return Err(StressViolation::AverageInconsistent {
                    cycles: m.cycles_run,
                    executed: m.ops_executed,
                    average: m.average_batch_size,
                });
            }
        }
        if self.pending_after_drain > 0 {
            return Err(StressViolation::BacklogNotDrained {
                pending: self.pending_after_drain,
            });
        }
        Ok(())
    }
}

const PRIORITY_MIX: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

/// Drive one deterministic stress run.
#[must_use]
pub fn run_stress(config: &StressConfig) -> StressReport {
    let scheduler = Scheduler::new(config.scheduler);
    let tracker = VisibilityTracker::new(scheduler.visibility_sink(), Rect::new(0, 0, 200, 200));
    let mut pump = FramePump::new(
        scheduler.clone(),
        ManualClock::new(config.scheduler.batch_timeout),
    );

    // One cell per item, priorities mixed, each observed as a 200x20 row.
    let cells: Vec<BatchedValue<u64>> = (0..config.items)
        .map(|i| {
            let cell = BatchedValue::new(&scheduler, 0u64)
                .with_priority(PRIORITY_MIX[i % PRIORITY_MIX.len()])
                .with_owner_tag(format!("stress-item-{i}"));
            tracker.observe(cell.id().clone(), Rect::new(0, (i as i32) * 20, 200, 20));
            cell
        })
        .collect();

    let mut submits = 0u64;
    let mut frames = 0usize;
    for wave in 0..config.waves {
        for k in 0..config.items_per_wave {
            let idx = (wave * config.items_per_wave + k) % config.items.max(1);
            for _ in 0..config.sets_per_item {
                cells[idx].update(|v| v + 1);
                submits += 1;
            }
        }
        // Scroll the viewport one row per wave so targets churn across the
        // threshold while the backlog drains.
        tracker.set_viewport(Rect::new(0, (wave as i32) * 20, 200, 200));
        for _ in 0..config.frames_between_waves {
            pump.pump_once();
            frames += 1;
        }
        tracing::debug!(wave, submits, pending = scheduler.pending_len(), "wave applied");
    }

    frames += pump.run_until_idle(config.drain_frames);
    let pending_after_drain = scheduler.pending_len();
    let value_sum = cells.iter().map(BatchedValue::get).sum();

    StressReport {
        dedup: config.scheduler.enable_deduplication,
        submits,
        frames,
        value_sum,
        pending_after_drain,
        metrics: scheduler.metrics(),
    }
}
