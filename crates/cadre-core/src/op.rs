#![forbid(unsafe_code)]

//! Operation descriptors: the unit of work submitted to the scheduler.
//!
//! Callers build a [`SubmitOp`] (identity, kind, priority, action); the
//! scheduler stamps it into a pending [`Op`] with its ordering fields
//! (`submitted_at`, `seq`) and tracker-owned visibility state.
//!
//! # Invariants
//!
//! - Two descriptors with the same [`OpId`] denote the same logical
//!   operation; the later submission coalesces into the earlier one's slot.
//! - An [`Op`]'s action is invoked at most once per descriptor lifetime.
//! - `visible` is owned by the visibility tracker and survives coalescing;
//!   resubmission replaces only kind, priority, owner tag, and the action.

use core::fmt;

use web_time::Instant;

/// Caller-chosen string identity for a logical operation.
///
/// Equal ids coalesce: resubmitting under an id that is already pending
/// replaces the pending entry rather than enqueueing a duplicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(String);

impl OpId {
    /// Create an id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a borrowed string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for OpId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a submitted operation does. Informational only — never affects
/// ordering. Reserved for future differentiated policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// A state mutation (value cell write, model update).
    #[default]
    State,
    /// A surface write (draw, layout, style change).
    Draw,
    /// An animation start.
    Animation,
}

/// Caller-assigned scheduling priority.
///
/// Immutable for a descriptor's lifetime once submitted; a resubmission
/// replaces the whole descriptor and may carry a different priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Executes before medium and low within a cycle.
    High,
    /// The default for caller handles.
    #[default]
    Medium,
    /// Deferred first under sustained overload.
    Low,
}

impl Priority {
    /// Sort weight: high=3, medium=2, low=1.
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

/// Tri-state visibility of an operation's on-screen target.
///
/// `Unknown` ranks as not-visible: visibility is an advisory tie-break
/// signal, never a correctness gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// No observation has reported yet (or none exists).
    #[default]
    Unknown,
    /// The target intersects the viewport above the threshold.
    Visible,
    /// The target is observed and below the threshold.
    Hidden,
}

impl Visibility {
    /// Whether this state sorts ahead of not-visible work when visibility
    /// prioritization is enabled.
    #[must_use]
    pub const fn ranks_visible(self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// The opaque side-effecting action a caller attaches to an operation.
///
/// Invoked at most once. An `Err` marks the operation failed; the failure
/// is logged by the runtime and never propagates to other batch members.
pub type OpAction = Box<dyn FnOnce() -> Result<(), Box<dyn std::error::Error>>>;

/// A submission: everything the caller chooses about an operation.
///
/// The scheduler stamps the rest (ordering fields, visibility) when it
/// accepts the submission.
pub struct SubmitOp {
    /// Logical identity; equal ids coalesce.
    pub id: OpId,
    /// Informational kind.
    pub kind: OpKind,
    /// Scheduling priority.
    pub priority: Priority,
    /// Free-form observability label.
    pub owner_tag: Option<String>,
    /// The action to run.
    pub run: OpAction,
}

impl SubmitOp {
    /// Build a submission with default kind ([`OpKind::State`]) and
    /// priority ([`Priority::Medium`]).
    pub fn new(
        id: impl Into<OpId>,
        run: impl FnOnce() -> Result<(), Box<dyn std::error::Error>> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind: OpKind::default(),
            priority: Priority::default(),
            owner_tag: None,
            run: Box::new(run),
        }
    }

    /// Set the operation kind.
    #[must_use]
    pub fn kind(mut self, kind: OpKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the scheduling priority.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach an observability label.
    #[must_use]
    pub fn owner_tag(mut self, tag: impl Into<String>) -> Self {
        self.owner_tag = Some(tag.into());
        self
    }

    /// Stamp this submission into a pending [`Op`].
    #[must_use]
    pub fn into_op(self, submitted_at: Instant, seq: u64) -> Op {
        Op {
            id: self.id,
            kind: self.kind,
            priority: self.priority,
            submitted_at,
            seq,
            visible: Visibility::Unknown,
            owner_tag: self.owner_tag,
            run: self.run,
        }
    }
}

impl fmt::Debug for SubmitOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitOp")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("owner_tag", &self.owner_tag)
            .finish_non_exhaustive()
    }
}

/// A pending operation: a stamped [`SubmitOp`] plus tracker-owned state.
pub struct Op {
    /// Logical identity.
    pub id: OpId,
    /// Informational kind.
    pub kind: OpKind,
    /// Scheduling priority.
    pub priority: Priority,
    /// Stamp of the most recent (re)submission.
    pub submitted_at: Instant,
    /// Per-scheduler submission counter; breaks `submitted_at` ties so the
    /// cycle order stays total under coarse clocks.
    pub seq: u64,
    /// Tracker-owned visibility of the operation's target.
    pub visible: Visibility,
    /// Free-form observability label.
    pub owner_tag: Option<String>,
    /// The action to run; consumed on execution.
    pub run: OpAction,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("visible", &self.visible)
            .field("owner_tag", &self.owner_tag)
            .finish_non_exhaustive()
    }
}
