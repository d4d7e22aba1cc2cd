#![forbid(unsafe_code)]

//! The pending set: identity-keyed coalescing plus the cycle order.
//!
//! [`PendingQueue`] is the scheduler's only mutable collection. Submission
//! inserts or coalesces by [`OpId`]; once per cycle the scheduler drains a
//! bounded, sorted batch and leaves the remainder untouched.
//!
//! # Cycle order
//!
//! [`cycle_order`] is a total order:
//!
//! 1. Priority weight, descending (high=3, medium=2, low=1).
//! 2. When visibility prioritization is enabled: visible targets first.
//! 3. Oldest `(submitted_at, seq)` first — FIFO within a priority class,
//!    which is what prevents starvation under sustained load.
//!
//! # Invariants
//!
//! - Exactly one entry per id at any instant.
//! - Coalescing keeps the tracker-owned visibility flag; everything the
//!   caller chose (kind, priority, owner tag, action) is replaced.
//! - `drain_batch` removes exactly the ops it returns.

use core::cmp::Ordering;

use ahash::AHashMap;

use crate::op::{Op, OpId, Visibility};

/// What happened to a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No entry existed for the id; the op was inserted.
    Inserted,
    /// An entry existed and deduplication is on: the op took over the
    /// entry's slot, keeping its visibility flag. Counted as a dedup.
    Coalesced,
    /// An entry existed but deduplication is off: last write wins, not
    /// counted as a dedup.
    Replaced,
}

/// Total order of a cycle's batch. See the module docs.
#[must_use]
pub fn cycle_order(a: &Op, b: &Op, prioritize_visible: bool) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| {
            if prioritize_visible {
                b.visible.ranks_visible().cmp(&a.visible.ranks_visible())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Identity-keyed set of pending operations.
#[derive(Debug, Default)]
pub struct PendingQueue {
    ops: AHashMap<OpId, Op>,
}

impl PendingQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether an entry exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &OpId) -> bool {
        self.ops.contains_key(id)
    }

    /// Insert a stamped op, coalescing on id collision.
    ///
    /// With `dedupe` the colliding entry's visibility flag survives into
    /// the replacement (it is tracker state, not caller state). Without
    /// `dedupe` the new op replaces the entry wholesale.
    pub fn insert(&mut self, mut op: Op, dedupe: bool) -> SubmitOutcome {
        match self.ops.get(&op.id) {
            Some(existing) if dedupe => {
                op.visible = existing.visible;
                self.ops.insert(op.id.clone(), op);
                SubmitOutcome::Coalesced
            }
            Some(_) => {
                self.ops.insert(op.id.clone(), op);
                SubmitOutcome::Replaced
            }
            None => {
                self.ops.insert(op.id.clone(), op);
                SubmitOutcome::Inserted
            }
        }
    }

    /// Update the visibility flag of a pending entry.
    ///
    /// Returns false when no entry exists for `id` (already executed or
    /// never submitted) — the transition is then a no-op by design.
    pub fn set_visibility(&mut self, id: &OpId, visible: Visibility) -> bool {
        match self.ops.get_mut(id) {
            Some(op) => {
                op.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Remove and return up to `cap` operations in cycle order.
    ///
    /// The remainder stays pending with stamps intact, so reapplying the
    /// same sort next cycle preserves FIFO within a priority class.
    pub fn drain_batch(&mut self, cap: usize, prioritize_visible: bool) -> Vec<Op> {
        let mut all: Vec<Op> = self.ops.drain().map(|(_, op)| op).collect();
        all.sort_by(|a, b| cycle_order(a, b, prioritize_visible));
        let rest = all.split_off(cap.min(all.len()));
        for op in rest {
            self.ops.insert(op.id.clone(), op);
        }
        all
    }

    /// Discard everything pending. Dropped ops never execute.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}
