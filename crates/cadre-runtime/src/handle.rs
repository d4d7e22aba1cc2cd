#![forbid(unsafe_code)]

//! Caller-facing convenience handles over the scheduler.
//!
//! These wrappers own the "what does execute actually do" side of the
//! contract: a [`BatchedValue`] turns value writes into coalescing state
//! ops, an [`AnimationBatch`] turns animation starts into visibility-ranked
//! ops with explicit completion, and [`draw_once`] submits a one-shot
//! surface write. The scheduler API itself stays fire-and-forget; only the
//! handle layer attaches [`Completion`] reporting.
//!
//! # Invariants
//!
//! 1. A handle's auto-generated id is process-unique (atomic counter), so
//!    two handles never coalesce with each other by accident.
//! 2. Rapid writes through one [`BatchedValue`] coalesce to one execution
//!    per cycle, using the last write.
//! 3. A [`Completion`] reaches `Done` or `Failed` at most once; operations
//!    discarded by `clear()` leave it pending forever (callers that care
//!    apply their own timeout, as specified for cleared work).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cadre_core::geometry::Rect;
use cadre_core::op::{OpId, OpKind, Priority, SubmitOp};

use crate::scheduler::Scheduler;
use crate::visibility::VisibilityTracker;

/// Process-wide counter for handle ids (`state-3`, `anim-7`, `draw-9`).
static HANDLE_IDS: AtomicU64 = AtomicU64::new(1);

fn next_handle_id(prefix: &str) -> OpId {
    let n = HANDLE_IDS.fetch_add(1, Ordering::Relaxed);
    OpId::new(format!("{prefix}-{n}"))
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Terminal outcome of a handle-scheduled operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionState {
    /// Not executed yet (or discarded by `clear()` — then it stays here).
    Pending,
    /// The action ran and returned `Ok`.
    Done,
    /// The action ran and returned `Err`; carries the error's message.
    Failed(String),
}

/// Shared single-threaded completion cell.
///
/// Poll between frames; there is no waker. Cloning shares the cell.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    state: Rc<RefCell<Option<CompletionState>>>,
}

impl Completion {
    fn pending() -> Self {
        Self::default()
    }

    /// Current state (a copy).
    #[must_use]
    pub fn state(&self) -> CompletionState {
        self.state
            .borrow()
            .clone()
            .unwrap_or(CompletionState::Pending)
    }

    /// Whether the operation has not reached a terminal state.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_none()
    }

    /// Whether the operation completed successfully.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.state(), CompletionState::Done)
    }

    /// Whether the operation failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state(), CompletionState::Failed(_))
    }

    fn settle(&self, state: CompletionState) {
        let mut slot = self.state.borrow_mut();
        if slot.is_none() {
            *slot = Some(state);
        }
    }

    /// Wrap an action so its outcome settles a new completion cell.
    ///
    /// A panicking action settles nothing: the scheduler discards the op
    /// and the completion stays pending.
    pub fn wrap(
        run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
    ) -> (
        impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
        Self,
    ) {
        let completion = Self::pending();
        let cell = completion.clone();
        let wrapped = move || {
            let result = run();
            match &result {
                Ok(()) => cell.settle(CompletionState::Done),
                Err(error) => cell.settle(CompletionState::Failed(error.to_string())),
            }
            result
        };
        (wrapped, completion)
    }
}

// ---------------------------------------------------------------------------
// BatchedValue<T>
// ---------------------------------------------------------------------------

/// A shared value cell whose writes are batched through the scheduler.
///
/// Every `set`/`update` schedules a state op under the handle's stable id,
/// so writes within one frame window coalesce: the cell mutates once per
/// cycle, with the last write. Reads see the last *executed* value.
///
/// ```ignore
/// let count = BatchedValue::new(&scheduler, 0);
/// count.set(1);
/// count.set(2);
/// assert_eq!(count.get(), 0);   // nothing executed yet
/// pump.run_until_idle(4);
/// assert_eq!(count.get(), 2);   // one execution, last write
/// ```
pub struct BatchedValue<T> {
    cell: Rc<RefCell<T>>,
    scheduler: Scheduler,
    id: OpId,
    priority: Priority,
    owner_tag: Option<String>,
    debounce: Option<Duration>,
}

impl<T> Clone for BatchedValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            scheduler: self.scheduler.clone(),
            id: self.id.clone(),
            priority: self.priority,
            owner_tag: self.owner_tag.clone(),
            debounce: self.debounce,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BatchedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedValue")
            .field("id", &self.id)
            .field("value", &*self.cell.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> BatchedValue<T> {
    /// A new cell holding `initial`, writing through `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, initial: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(initial)),
            scheduler: scheduler.clone(),
            id: next_handle_id("state"),
            priority: Priority::default(),
            owner_tag: None,
            debounce: None,
        }
    }

    /// Set the priority used for this handle's writes.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach an observability label to this handle's writes.
    #[must_use]
    pub fn with_owner_tag(mut self, tag: impl Into<String>) -> Self {
        self.owner_tag = Some(tag.into());
        self
    }

    /// Debounce writes: each write defers submission by `window`,
    /// replacing any still-waiting write from this handle.
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// The handle's operation id (useful for wiring visibility).
    #[must_use]
    pub fn id(&self) -> &OpId {
        &self.id
    }

    /// Read the last-executed value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    /// Read through a closure without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow())
    }

    /// Schedule a write of `value`.
    pub fn set(&self, value: T) {
        let cell = Rc::clone(&self.cell);
        self.submit(move || {
            *cell.borrow_mut() = value;
            Ok(())
        });
    }

    /// Schedule a functional update computed from the value at execution
    /// time (not at submission time).
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        let cell = Rc::clone(&self.cell);
        self.submit(move || {
            let next = f(&cell.borrow());
            *cell.borrow_mut() = next;
            Ok(())
        });
    }

    fn submit(&self, run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static) {
        let mut op = SubmitOp::new(self.id.clone(), run)
            .kind(OpKind::State)
            .priority(self.priority);
        if let Some(tag) = &self.owner_tag {
            op = op.owner_tag(tag.clone());
        }
        match self.debounce {
            Some(window) => self.scheduler.schedule_after(window, op),
            None => self.scheduler.schedule(op),
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationBatch
// ---------------------------------------------------------------------------

/// Schedules animation starts as batched operations.
///
/// Each [`start`](Self::start) submits under a fresh id (`anim-N-K`) and
/// returns its [`Completion`]. When the handle is observed, every started
/// id is pointed at the handle's target rectangle so pending starts rank
/// as visible work. Dropping the handle detaches all of its observations
/// (RAII, like a subscription guard).
#[derive(Debug)]
pub struct AnimationBatch {
    scheduler: Scheduler,
    observed: Option<(VisibilityTracker, Rect)>,
    base: u64,
    started: u64,
    live_ids: Vec<OpId>,
    priority: Priority,
    owner_tag: Option<String>,
}

impl AnimationBatch {
    /// A new animation handle writing through `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: scheduler.clone(),
            observed: None,
            base: HANDLE_IDS.fetch_add(1, Ordering::Relaxed),
            started: 0,
            live_ids: Vec::new(),
            priority: Priority::default(),
            owner_tag: None,
        }
    }

    /// Set the priority for starts from this handle.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach an observability label.
    #[must_use]
    pub fn with_owner_tag(mut self, tag: impl Into<String>) -> Self {
        self.owner_tag = Some(tag.into());
        self
    }

    /// Rank this handle's pending starts by the visibility of `target`.
    #[must_use]
    pub fn observed(mut self, tracker: &VisibilityTracker, target: Rect) -> Self {
        self.observed = Some((tracker.clone(), target));
        self
    }

    /// Schedule one animation start; returns its completion.
    pub fn start(
        &mut self,
        run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
    ) -> Completion {
        self.started += 1;
        let id = OpId::new(format!("anim-{}-{}", self.base, self.started));
        if let Some((tracker, target)) = &self.observed {
            tracker.observe(id.clone(), *target);
            self.live_ids.push(id.clone());
        }

        let (wrapped, completion) = Completion::wrap(run);
        let mut op = SubmitOp::new(id, wrapped)
            .kind(OpKind::Animation)
            .priority(self.priority);
        if let Some(tag) = &self.owner_tag {
            op = op.owner_tag(tag.clone());
        }
        self.scheduler.schedule(op);
        completion
    }

    /// Release every observation this handle registered. Idempotent; also
    /// runs on drop.
    pub fn detach(&mut self) {
        if let Some((tracker, _)) = &self.observed {
            for id in self.live_ids.drain(..) {
                tracker.unobserve(&id);
            }
        } else {
            self.live_ids.clear();
        }
    }
}

impl Drop for AnimationBatch {
    fn drop(&mut self) {
        self.detach();
    }
}

// ---------------------------------------------------------------------------
// draw_once
// ---------------------------------------------------------------------------

/// Submit a one-shot surface write under a fresh `draw-N` id.
pub fn draw_once(
    scheduler: &Scheduler,
    priority: Priority,
    run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
) -> (OpId, Completion) {
    let id = next_handle_id("draw");
    let (wrapped, completion) = Completion::wrap(run);
    scheduler.schedule(
        SubmitOp::new(id.clone(), wrapped)
            .kind(OpKind::Draw)
            .priority(priority),
    );
    (id, completion)
}

/// [`draw_once`] with the write's target observed for visibility ranking.
///
/// The observation stays registered after execution (events for executed
/// ids are no-ops); call [`VisibilityTracker::unobserve`] with the
/// returned id when the target goes away.
pub fn draw_once_observed(
    scheduler: &Scheduler,
    tracker: &VisibilityTracker,
    target: Rect,
    priority: Priority,
    run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
) -> (OpId, Completion) {
    let id = next_handle_id("draw");
    tracker.observe(id.clone(), target);
    let (wrapped, completion) = Completion::wrap(run);
    scheduler.schedule(
        SubmitOp::new(id.clone(), wrapped)
            .kind(OpKind::Draw)
            .priority(priority),
    );
    (id, completion)
}
