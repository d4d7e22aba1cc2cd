#![forbid(unsafe_code)]

//! The Cadre runtime: frame-paced batch scheduling over the `cadre-core`
//! data model.
//!
//! - [`Scheduler`]: owns the pending set, coalesces submissions, executes
//!   one bounded batch per frame boundary, keeps counters.
//! - [`VisibilityTracker`]: watches target rectangles against a viewport
//!   and feeds `(id, visibility)` transitions to the scheduler over a
//!   one-directional channel.
//! - [`FramePump`]: couples a scheduler to a [`FrameClock`] — real time
//!   ([`IntervalClock`]) or deterministic virtual time ([`ManualClock`]).
//! - [`handle`]: caller conveniences — batched value cells, animation
//!   batches with explicit [`Completion`], one-shot draws.
//!
//! # Concurrency model
//!
//! Single-threaded cooperative execution: all handles are `Rc`-shared and
//! every mutation happens on one logical thread, so no locking exists
//! anywhere on the scheduling path. The one cross-thread artifact is
//! [`MetricsReader`], a lock-free snapshot subscriber for dashboards.
//!
//! ```ignore
//! use cadre_core::{Rect, SchedulerConfig};
//! use cadre_runtime::{FramePump, ManualClock, Scheduler, VisibilityTracker};
//! use cadre_runtime::handle::BatchedValue;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! let tracker = VisibilityTracker::new(scheduler.visibility_sink(), Rect::new(0, 0, 80, 24));
//! let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(Duration::from_millis(16)));
//!
//! let counter = BatchedValue::new(&scheduler, 0u64);
//! counter.update(|n| n + 1);
//! pump.run_until_idle(4);
//! assert_eq!(counter.get(), 1);
//! ```

pub mod handle;
pub mod pump;
pub mod scheduler;
pub mod visibility;

pub use handle::{AnimationBatch, BatchedValue, Completion, CompletionState, draw_once,
    draw_once_observed};
pub use pump::{FrameClock, FramePump, IntervalClock, ManualClock};
pub use scheduler::{CycleOutcome, MetricsReader, Scheduler};
pub use visibility::{VISIBILITY_THRESHOLD, VisibilityEvent, VisibilitySink, VisibilityTracker};
