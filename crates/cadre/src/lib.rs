#![forbid(unsafe_code)]

//! Cadre: frame-synchronous mutation batching for interactive UIs.
//!
//! This facade re-exports the public surface of [`cadre_core`] and
//! [`cadre_runtime`]. Most applications only need the [`prelude`].
//!
//! ```ignore
//! use cadre::prelude::*;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(Duration::from_millis(16)));
//!
//! let fps = BatchedValue::new(&scheduler, 0u32).with_priority(Priority::High);
//! fps.set(60);
//! pump.run_until_idle(2);
//! assert_eq!(fps.get(), 60);
//! ```

pub use cadre_core as core;
pub use cadre_runtime as runtime;

pub use cadre_core::{
    MetricsSnapshot, Op, OpAction, OpId, OpKind, Priority, Rect, SchedulerConfig, SubmitOp,
    Visibility,
};
pub use cadre_runtime::{
    AnimationBatch, BatchedValue, Completion, CompletionState, CycleOutcome, FrameClock,
    FramePump, IntervalClock, ManualClock, MetricsReader, Scheduler, VisibilityEvent,
    VisibilitySink, VisibilityTracker, draw_once, draw_once_observed,
};

/// Everything a typical caller needs.
pub mod prelude {
    pub use cadre_core::{
        MetricsSnapshot, OpId, OpKind, Priority, Rect, SchedulerConfig, SubmitOp, Visibility,
    };
    pub use cadre_runtime::{
        AnimationBatch, BatchedValue, Completion, CompletionState, FrameClock, FramePump,
        IntervalClock, ManualClock, Scheduler, VisibilityTracker,
    };
}
