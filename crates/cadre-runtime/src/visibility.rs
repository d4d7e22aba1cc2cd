#![forbid(unsafe_code)]

//! Visibility tracking: observes whether an operation's target intersects
//! the viewport and reports transitions over a one-directional event
//! channel.
//!
//! The tracker and the scheduler are independently lifecycled: the tracker
//! emits [`VisibilityEvent`]s into a [`VisibilitySink`] obtained from
//! [`Scheduler::visibility_sink`](crate::scheduler::Scheduler::visibility_sink);
//! the scheduler drains and applies them at the start of each cycle. The
//! tracker never reaches into the pending set, and an event for an id with
//! no pending descriptor is a no-op.
//!
//! # Threshold
//!
//! A target is visible when at least 10 % of its area intersects the
//! viewport. Empty targets are never visible.
//!
//! # Failure Modes
//!
//! Visibility is advisory only. A missing tracker, an unobserved id, or a
//! stale viewport never blocks scheduling — an unknown target simply ranks
//! as not-visible, which affects tie-break order, never correctness.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ahash::AHashMap;
use cadre_core::geometry::Rect;
use cadre_core::op::{OpId, Visibility};

/// Minimum fraction of a target's area that must intersect the viewport.
pub const VISIBILITY_THRESHOLD: f64 = 0.1;

/// A visibility transition for one operation id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityEvent {
    /// The operation the transition applies to.
    pub id: OpId,
    /// The new state ([`Visibility::Visible`] or [`Visibility::Hidden`]).
    pub visibility: Visibility,
}

/// Producer/consumer endpoint of the visibility event channel.
///
/// Clones share one queue. The tracker pushes; the scheduler takes.
#[derive(Clone, Debug, Default)]
pub struct VisibilitySink {
    queue: Rc<RefCell<VecDeque<VisibilityEvent>>>,
}

impl VisibilitySink {
    /// A fresh, empty channel endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a transition.
    pub fn push(&self, event: VisibilityEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Take every queued transition, oldest first.
    #[must_use]
    pub fn take_all(&self) -> Vec<VisibilityEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Number of undelivered transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether no transitions are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

#[derive(Debug)]
struct Target {
    rect: Rect,
    visible: bool,
}

#[derive(Debug)]
struct TrackerInner {
    viewport: Rect,
    targets: AHashMap<OpId, Target>,
    sink: VisibilitySink,
}

/// Observes target rectangles against a viewport and emits transitions.
///
/// Cheaply cloneable handle; clones share one target map and viewport.
#[derive(Clone, Debug)]
pub struct VisibilityTracker {
    inner: Rc<RefCell<TrackerInner>>,
}

impl VisibilityTracker {
    /// Build a tracker emitting into `sink`, with an initial viewport.
    #[must_use]
    pub fn new(sink: VisibilitySink, viewport: Rect) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrackerInner {
                viewport,
                targets: AHashMap::new(),
                sink,
            })),
        }
    }

    /// Begin observing `target` under `id`.
    ///
    /// Re-observing an id replaces its previous target (most recent wins).
    /// The current state is emitted immediately, so a pending descriptor
    /// picks it up at the next cycle.
    pub fn observe(&self, id: impl Into<OpId>, target: Rect) {
        let id = id.into();
        let mut inner = self.inner.borrow_mut();
        let visible = is_visible(inner.viewport, target);
        inner.targets.insert(
            id.clone(),
            Target {
                rect: target,
                visible,
            },
        );
        emit(&inner.sink, id, visible);
    }

    /// Stop observing `id` and release the watch. Idempotent: unknown ids
    /// are a no-op and raise no error.
    pub fn unobserve(&self, id: &OpId) {
        self.inner.borrow_mut().targets.remove(id);
    }

    /// Whether `id` currently has an active observation.
    #[must_use]
    pub fn is_observing(&self, id: &OpId) -> bool {
        self.inner.borrow().targets.contains_key(id)
    }

    /// The current viewport.
    #[must_use]
    pub fn viewport(&self) -> Rect {
        self.inner.borrow().viewport
    }

    /// Replace the viewport and emit a transition for every target whose
    /// visibility crossed the threshold.
    pub fn set_viewport(&self, viewport: Rect) {
        let mut inner = self.inner.borrow_mut();
        inner.viewport = viewport;
        let mut transitions = Vec::new();
        for (id, target) in &mut inner.targets {
            let visible = is_visible(viewport, target.rect);
            if visible != target.visible {
                target.visible = visible;
                transitions.push((id.clone(), visible));
            }
        }
        for (id, visible) in transitions {
            emit(&inner.sink, id, visible);
        }
    }

    /// Move one target, emitting a transition if it crossed the threshold.
    /// Unknown ids are a no-op.
    pub fn move_target(&self, id: &OpId, rect: Rect) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let viewport = inner.viewport;
        let Some(target) = inner.targets.get_mut(id) else {
            return;
        };
        target.rect = rect;
        let visible = is_visible(viewport, rect);
        if visible != target.visible {
            target.visible = visible;
            let id = id.clone();
            emit(&inner.sink, id, visible);
        }
    }
}

fn is_visible(viewport: Rect, target: Rect) -> bool {
    !target.is_empty() && target.coverage_by(viewport) >= VISIBILITY_THRESHOLD
}

fn emit(sink: &VisibilitySink, id: OpId, visible: bool) {
    let visibility = if visible {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };
    tracing::trace!(id = %id, ?visibility, "visibility transition");
    sink.push(VisibilityEvent { id, visibility });
}
