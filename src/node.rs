//! Tree vertices.
//!
//! A [`Node`] owns three independently locked field groups:
//!
//! - **slots** (`lock`): the value handle and the two owned children. A node
//!   holding a value always has exactly two children, either of which may be
//!   an empty leaf; an empty leaf holds the sentinel and no children.
//! - **balance** (`weight`): the signed weight (right height minus left
//!   height, tracked incrementally), the two pending-adjustment counters,
//!   and the `rebalancing` guard flag.
//! - **bounds** (`bounds[0]`, `bounds[1]`): cached minimum / maximum value
//!   reachable in the subtree rooted here, including this node's own value.
//!
//! The parent back-pointer is non-owning metadata written once when the
//! parent attaches the child; it is only followed by the quiescent scan in
//! [`crate::scan`] and is never part of the locking protocol.
//!
//! Lock order everywhere in the crate: boundary locks (side 0 then side 1)
//! before the node lock before the weight lock, and strictly root-to-leaf.

use std::sync::{Arc, Weak};

use crate::guarded::{Guarded, LockTally};
use crate::handle::ValueHandle;
use crate::trace::Trace;

/// Pending-adjustment slot for operations that may push weight negative.
pub(crate) const PENDING_NEG: usize = 0;
/// Pending-adjustment slot for operations that may push weight positive.
pub(crate) const PENDING_POS: usize = 1;

const BOUND_LABELS: [&str; 2] = ["boundary0", "boundary1"];

// ============================================================================
//  Slots / Balance
// ============================================================================

/// Value handle and owned children, guarded by the node lock.
#[derive(Debug)]
pub(crate) struct Slots {
    value: ValueHandle,
    children: Option<[Arc<Node>; 2]>,
}

impl Slots {
    #[inline]
    pub(crate) fn value(&self) -> ValueHandle {
        self.value
    }

    pub(crate) fn set_value(&mut self, value: ValueHandle) {
        self.value = value;
    }

    /// The owned child on `side`.
    ///
    /// # Panics
    ///
    /// Panics when the node is an empty leaf; a node holding a value always
    /// has both children, so a missing child is an invariant breach.
    pub(crate) fn child(&self, side: usize) -> &Arc<Node> {
        match &self.children {
            Some(children) => &children[side],
            None => panic!("non-empty node is missing its children"),
        }
    }

    pub(crate) fn attach_children(&mut self, children: [Arc<Node>; 2]) {
        self.children = Some(children);
    }

    /// Revert to the empty-leaf state: clear the value, detach the children.
    pub(crate) fn clear(&mut self) {
        self.value = ValueHandle::EMPTY;
        self.children = None;
    }

    pub(crate) fn children(&self) -> Option<&[Arc<Node>; 2]> {
        self.children.as_ref()
    }
}

/// Weight bookkeeping, guarded by the weight lock.
#[derive(Debug)]
pub(crate) struct Balance {
    /// Right subtree height minus left subtree height, tracked incrementally.
    pub(crate) weight: i64,
    /// In-flight operations that may still change the weight in each
    /// direction: `[PENDING_NEG]` toward negative, `[PENDING_POS]` toward
    /// positive.
    pub(crate) pending: [i64; 2],
    /// At most one in-flight rebalance per node.
    pub(crate) rebalancing: bool,
}

// ============================================================================
//  Node
// ============================================================================

/// A vertex of the concurrent weight-balanced tree.
///
/// Nodes begin life as empty leaves; the first insert through one
/// materializes it (value, boundaries, two fresh empty-leaf children), and a
/// leaf delete reverts it. Structure is owned strictly parent-to-child, so
/// nothing is ever deallocated out from under a concurrent reader.
#[derive(Debug)]
pub struct Node {
    pub(crate) lock: Guarded<Slots>,
    pub(crate) weight: Guarded<Balance>,
    pub(crate) bounds: [Guarded<ValueHandle>; 2],
    parent: Weak<Node>,
}

impl Node {
    fn new_leaf(parent: Weak<Node>) -> Arc<Self> {
        Arc::new(Self {
            lock: Guarded::new(
                "node",
                Slots {
                    value: ValueHandle::EMPTY,
                    children: None,
                },
            ),
            weight: Guarded::new(
                "weight",
                Balance {
                    weight: 0,
                    pending: [0, 0],
                    rebalancing: false,
                },
            ),
            bounds: [
                Guarded::new(BOUND_LABELS[0], ValueHandle::EMPTY),
                Guarded::new(BOUND_LABELS[1], ValueHandle::EMPTY),
            ],
            parent,
        })
    }

    /// A fresh empty tree: a single empty leaf with no parent.
    #[must_use]
    pub fn new_root() -> Arc<Self> {
        Self::new_leaf(Weak::new())
    }

    /// A fresh empty leaf whose back-pointer names `parent`.
    ///
    /// The back-pointer is published here, before the child becomes reachable
    /// through the parent's slots, and is never written again.
    #[must_use]
    pub(crate) fn new_child(parent: &Arc<Self>) -> Arc<Self> {
        Self::new_leaf(Arc::downgrade(parent))
    }

    /// Fill an empty leaf with its first value.
    ///
    /// Caller holds both boundary locks and the node lock. Installs the
    /// value, points both boundaries at it, and attaches two empty-leaf
    /// children whose back-pointers name this node.
    pub(crate) fn materialize(this: &Arc<Self>, value: ValueHandle) {
        this.lock.with(|slots| {
            slots.set_value(value);
            slots.attach_children([Self::new_child(this), Self::new_child(this)]);
        });
        this.bounds[0].with(|bound| *bound = value);
        this.bounds[1].with(|bound| *bound = value);
    }

    /// Momentary snapshot of this node's value handle.
    ///
    /// Diagnostic / quiescent read; takes no part in lock coupling.
    #[must_use]
    pub fn value(&self) -> ValueHandle {
        self.lock.peek(Slots::value)
    }

    /// Momentary snapshot of the child on `side`, if the node holds a value.
    pub(crate) fn peek_child(&self, side: usize) -> Option<Arc<Self>> {
        self.lock
            .peek(|slots| slots.children().map(|children| Arc::clone(&children[side])))
    }

    /// The parent, if this node is not the root and the tree is still alive.
    pub(crate) fn parent(&self) -> Option<Arc<Self>> {
        self.parent.upgrade()
    }

    /// Locked read of the cached boundary on `side`.
    pub(crate) fn boundary(&self, side: usize, tally: &LockTally, trace: &Trace) -> ValueHandle {
        self.bounds[side].lock(tally, trace);
        let bound = self.bounds[side].with(|bound| *bound);
        self.bounds[side].unlock(tally, trace);
        bound
    }

    /// Optimistically record an in-flight operation that may move the weight
    /// in the `sign` direction.
    pub(crate) fn bump_pending(&self, sign: usize, tally: &LockTally, trace: &Trace) {
        self.weight.lock(tally, trace);
        self.weight.with(|balance| balance.pending[sign] += 1);
        self.weight.unlock(tally, trace);
    }

    /// Withdraw an optimistic [`Node::bump_pending`] that will not happen.
    ///
    /// # Panics
    ///
    /// Panics when the counter would go negative.
    pub(crate) fn cancel_pending(&self, sign: usize, tally: &LockTally, trace: &Trace) {
        self.weight.lock(tally, trace);
        self.weight.with(|balance| {
            balance.pending[sign] -= 1;
            assert!(
                balance.pending[sign] >= 0,
                "pending weight adjustment counter driven below zero"
            );
        });
        self.weight.unlock(tally, trace);
    }

    /// Apply a committed weight change and drain the matching pending slot.
    ///
    /// # Panics
    ///
    /// Panics when the drained counter would go negative.
    pub(crate) fn commit_weight(&self, delta: i64, tally: &LockTally, trace: &Trace) {
        self.weight.lock(tally, trace);
        self.weight.with(|balance| {
            balance.weight += delta;
            let sign = usize::from(delta > 0);
            balance.pending[sign] -= delta.abs();
            assert!(
                balance.pending[sign] >= 0,
                "pending weight adjustment counter driven below zero"
            );
        });
        self.weight.unlock(tally, trace);
    }

    /// Momentary snapshot of `(weight, pending)` for diagnostics and audits.
    #[must_use]
    pub fn balance(&self) -> (i64, [i64; 2]) {
        self.weight.peek(|balance| (balance.weight, balance.pending))
    }

    /// Momentary snapshot of the cached `[min, max]` boundary handles.
    #[must_use]
    pub fn boundaries(&self) -> [ValueHandle; 2] {
        [
            self.bounds[0].peek(|bound| *bound),
            self.bounds[1].peek(|bound| *bound),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_starts_as_empty_leaf() {
        let root = Node::new_root();
        assert!(root.value().is_empty());
        assert!(root.peek_child(0).is_none());
        assert!(root.parent().is_none());
        assert_eq!(root.balance(), (0, [0, 0]));
        assert!(root.boundaries()[0].is_empty());
    }

    #[test]
    fn materialize_installs_value_children_and_bounds() {
        let root = Node::new_root();
        let tally = LockTally::new();
        let trace = Trace::disabled();
        root.bounds[0].lock(&tally, &trace);
        root.bounds[1].lock(&tally, &trace);
        root.lock.lock(&tally, &trace);
        Node::materialize(&root, ValueHandle::new(3));
        root.bounds[0].unlock(&tally, &trace);
        root.bounds[1].unlock(&tally, &trace);
        root.lock.unlock(&tally, &trace);
        tally.finish("test", &trace);

        assert_eq!(root.value(), ValueHandle::new(3));
        assert_eq!(root.boundaries(), [ValueHandle::new(3); 2]);
        let left = root.peek_child(0).unwrap();
        assert!(left.value().is_empty());
        assert!(Arc::ptr_eq(&left.parent().unwrap(), &root));
    }

    #[test]
    #[should_panic(expected = "driven below zero")]
    fn draining_unbumped_pending_is_fatal() {
        let root = Node::new_root();
        root.cancel_pending(PENDING_POS, &LockTally::new(), &Trace::disabled());
    }

    #[test]
    fn commit_weight_drains_the_matching_side() {
        let root = Node::new_root();
        let tally = LockTally::new();
        let trace = Trace::disabled();
        root.bump_pending(PENDING_POS, &tally, &trace);
        root.commit_weight(1, &tally, &trace);
        assert_eq!(root.balance(), (1, [0, 0]));
        root.bump_pending(PENDING_NEG, &tally, &trace);
        root.commit_weight(-1, &tally, &trace);
        assert_eq!(root.balance(), (0, [0, 0]));
        tally.finish("test", &trace);
    }
}
