#![forbid(unsafe_code)]

//! The batch scheduler: pending-set ownership, cycle execution, and
//! counters.
//!
//! [`Scheduler`] is a cheaply cloneable single-threaded handle
//! (`Rc<RefCell<..>>` shared ownership). Construct one per rendering
//! surface and pass it by handle; there is no global instance.
//!
//! # Cycle
//!
//! A cycle runs at most once per frame boundary, driven by a
//! [`FramePump`](crate::pump::FramePump):
//!
//! 1. Drain visibility events into pending descriptors.
//! 2. Promote deferred submissions whose deadline has passed.
//! 3. Empty pending set → disarm, touch no counters.
//! 4. Sort pending ops (priority desc, visible first, oldest first), take
//!    the first `max_batch_size`.
//! 5. Invoke each action; a failure (Err or panic) is logged and the op is
//!    discarded — the batch continues.
//! 6. Update counters, publish a snapshot, re-arm iff work remains.
//!
//! # Invariants
//!
//! - One pending entry per id; a coalesced submission increments the dedup
//!   counter and refreshes the ordering stamp.
//! - An op leaves the pending set exactly once (executed, failed, or
//!   cleared).
//! - `clear()` never touches counters; [`Scheduler::reset_metrics`] is the
//!   explicit, separate reset.
//!
//! # Failure Modes
//!
//! - Action returns `Err`: logged at `warn`, op discarded, not retried.
//! - Action panics: caught, logged at `warn`, op discarded; the cycle loop
//!   survives (note: with `panic = "abort"` profiles this isolation is
//!   unavailable).
//! - Reentrant `schedule` from inside an action lands in the pending set
//!   and executes no earlier than the next cycle.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use cadre_core::config::SchedulerConfig;
use cadre_core::metrics::{Counters, MetricsSnapshot};
use cadre_core::op::{Op, OpId, SubmitOp};
use cadre_core::queue::{PendingQueue, SubmitOutcome};
use web_time::Instant;

use crate::visibility::VisibilitySink;

/// What a [`Scheduler::run_cycle`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending; the loop disarmed (unless deferred submissions
    /// are still waiting) and no counters changed.
    Idle,
    /// A batch executed.
    Ran {
        /// Operations consumed from the pending set (failures included).
        executed: usize,
        /// Of those, how many failed (Err or panic).
        failed: usize,
        /// Whether work remains and the loop stays armed.
        rearmed: bool,
    },
}

/// Cross-thread read-only access to the latest metrics snapshot.
///
/// The scheduler publishes after every executed cycle and whenever the
/// coalesce counter moves; readers (dashboards) never block the scheduling
/// thread.
#[derive(Clone, Debug)]
pub struct MetricsReader {
    shared: Arc<ArcSwap<MetricsSnapshot>>,
}

impl MetricsReader {
    /// The most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> MetricsSnapshot {
        self.shared.load().as_ref().clone()
    }
}

struct DeferredOp {
    due: Instant,
    op: SubmitOp,
}

struct SchedulerInner {
    config: SchedulerConfig,
    queue: PendingQueue,
    deferred: Vec<DeferredOp>,
    counters: Counters,
    events: VisibilitySink,
    armed: bool,
    next_seq: u64,
}

/// The frame-synchronous mutation batching scheduler.
///
/// Clones share one instance. All methods are synchronous and never
/// suspend; the only asynchronous boundary is the gap between arming and
/// the next frame boundary, during which submissions and visibility events
/// freely mutate the pending set.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
    published: Arc<ArcSwap<MetricsSnapshot>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("pending", &inner.queue.len())
            .field("deferred", &inner.deferred.len())
            .field("armed", &inner.armed)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Construct a scheduler with the given configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                config,
                queue: PendingQueue::new(),
                deferred: Vec::new(),
                counters: Counters::new(),
                events: VisibilitySink::new(),
                armed: false,
                next_seq: 0,
            })),
            published: Arc::new(ArcSwap::from_pointee(MetricsSnapshot::default())),
        }
    }

    /// Submit an operation, coalescing with a pending same-id entry.
    ///
    /// Arms the execution loop if it is not already armed. Never suspends,
    /// never fails; a broken action surfaces when the cycle runs it.
    pub fn schedule(&self, op: SubmitOp) {
        let mut inner = self.inner.borrow_mut();
        let outcome = Self::submit_locked(&mut inner, op, Instant::now());
        if outcome == SubmitOutcome::Coalesced {
            self.published.store(Arc::new(inner.counters.snapshot()));
        }
    }

    /// Submit an operation after `delay` (debounced submission).
    ///
    /// The op stays outside the pending set until the first cycle whose
    /// boundary time passes the deadline; a later `schedule_after` for the
    /// same id before that replaces it, restarting the window. Deferred
    /// submissions keep the loop armed.
    pub fn schedule_after(&self, delay: Duration, op: SubmitOp) {
        let mut inner = self.inner.borrow_mut();
        let due = Instant::now() + delay;
        inner.deferred.retain(|d| d.op.id != op.id);
        tracing::debug!(id = %op.id, delay_ms = delay.as_millis() as u64, "deferred submission");
        inner.deferred.push(DeferredOp { due, op });
        Self::arm(&mut inner);
    }

    fn submit_locked(inner: &mut SchedulerInner, op: SubmitOp, at: Instant) -> SubmitOutcome {
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = op.id.clone();
        let outcome = inner
            .queue
            .insert(op.into_op(at, seq), inner.config.enable_deduplication);
        match outcome {
            SubmitOutcome::Coalesced => {
                inner.counters.record_coalesce();
                tracing::trace!(id = %id, "submission coalesced");
            }
            SubmitOutcome::Replaced => {
                tracing::trace!(id = %id, "submission replaced (dedup off)");
            }
            SubmitOutcome::Inserted => {}
        }
        Self::arm(inner);
        outcome
    }

    fn arm(inner: &mut SchedulerInner) {
        if !inner.armed {
            inner.armed = true;
            tracing::debug!("cycle armed");
        }
    }

    /// Whether a cycle is armed for the next frame boundary.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.borrow().armed
    }

    /// Number of operations currently pending (deferred excluded).
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Copy of the configuration this scheduler was built with.
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config
    }

    /// The endpoint a [`VisibilityTracker`](crate::visibility::VisibilityTracker)
    /// emits `(id, visibility)` events into.
    #[must_use]
    pub fn visibility_sink(&self) -> VisibilitySink {
        self.inner.borrow().events.clone()
    }

    /// Immutable copy of the performance counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.borrow().counters.snapshot()
    }

    /// A cross-thread reader over the published snapshots.
    #[must_use]
    pub fn metrics_reader(&self) -> MetricsReader {
        MetricsReader {
            shared: Arc::clone(&self.published),
        }
    }

    /// Zero the counters. Explicit — `clear()` never does this.
    pub fn reset_metrics(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.counters.reset();
        self.published.store(Arc::new(inner.counters.snapshot()));
    }

    /// Discard all pending and deferred work and disarm the loop.
    ///
    /// Dropped operations never execute and never report completion —
    /// callers holding a [`Completion`](crate::handle::Completion) see it
    /// stay pending (apply a timeout if that matters). Counters are left
    /// untouched.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.queue.len() + inner.deferred.len();
        inner.queue.clear();
        inner.deferred.clear();
        inner.armed = false;
        tracing::debug!(dropped, "scheduler cleared");
    }

    /// Execute one cycle at frame boundary `now`.
    ///
    /// Normally called by a [`FramePump`](crate::pump::FramePump); exposed
    /// for hosts embedding the scheduler in an existing frame loop. Calling
    /// it from inside a running action will panic (the scheduler is
    /// single-threaded, non-reentrant at cycle granularity).
    pub fn run_cycle(&self, now: Instant) -> CycleOutcome {
        let batch = {
            let mut inner = self.inner.borrow_mut();
            for event in inner.events.take_all() {
                inner.queue.set_visibility(&event.id, event.visibility);
            }
            Self::promote_deferred(&mut inner, now);
            if inner.queue.is_empty() {
                inner.armed = !inner.deferred.is_empty();
                if !inner.armed {
                    tracing::debug!("cycle disarmed (idle)");
                }
                return CycleOutcome::Idle;
            }
            let cap = inner.config.max_batch_size;
            let prioritize = inner.config.prioritize_visible;
            inner.queue.drain_batch(cap, prioritize)
        };

        let started = Instant::now();
        let executed = batch.len();
        let mut failed = 0usize;
        // No borrow held here: actions may reenter schedule()/clear().
        for op in batch {
            let Op {
                id, owner_tag, run, ..
            } = op;
            match catch_unwind(AssertUnwindSafe(run)) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failed += 1;
                    tracing::warn!(
                        id = %id,
                        owner = owner_tag.as_deref().unwrap_or(""),
                        error = %error,
                        "operation failed; discarded without retry"
                    );
                }
                Err(panic) => {
                    failed += 1;
                    tracing::warn!(
                        id = %id,
                        owner = owner_tag.as_deref().unwrap_or(""),
                        panic = panic_message(&panic),
                        "operation panicked; discarded without retry"
                    );
                }
            }
        }

        let rearmed = {
            let mut inner = self.inner.borrow_mut();
            inner.counters.record_cycle(executed, started.elapsed());
            inner.armed = !inner.queue.is_empty() || !inner.deferred.is_empty();
            self.published.store(Arc::new(inner.counters.snapshot()));
            inner.armed
        };
        CycleOutcome::Ran {
            executed,
            failed,
            rearmed,
        }
    }

    fn promote_deferred(inner: &mut SchedulerInner, now: Instant) {
        if inner.deferred.is_empty() {
            return;
        }
        let mut waiting = Vec::with_capacity(inner.deferred.len());
        let mut due = Vec::new();
        for entry in inner.deferred.drain(..) {
            if entry.due <= now {
                due.push(entry.op);
            } else {
                waiting.push(entry);
            }
        }
        inner.deferred = waiting;
        for op in due {
            Self::submit_locked(inner, op, now);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
