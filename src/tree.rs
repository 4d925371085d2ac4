//! The tree façade.
//!
//! [`Tree`] owns the root node and a default [`Trace`], and exposes the
//! three entry points as inline calls on the invoking task. Callers that
//! want the hooks (first-lock, rebalance observation, `must_match`) use the
//! functions in [`crate::ops`] directly against [`Tree::root`].

use std::cmp::Ordering;
use std::sync::Arc;

use crate::handle::ValueHandle;
use crate::manager::OperationManager;
use crate::node::Node;
use crate::ops;
use crate::scan::Scan;
use crate::trace::Trace;

/// A concurrent weight-balanced binary search tree over externally stored
/// values.
///
/// The tree holds only opaque [`ValueHandle`]s; storage, ordering, and task
/// spawning are the capability of the per-operation [`OperationManager`].
/// Any number of searches, inserts, and deletes may run against the same
/// `Tree` from different tasks; rebalancing happens asynchronously in the
/// background whenever an operation's unwind detects a sufficiently
/// confirmed imbalance.
///
/// # Example
///
/// ```rust,ignore
/// let tree = Tree::new();
/// // One manager per operation, bound to that operation's value.
/// tree.insert(&catalog.manager_for(record));
/// tree.search(&catalog.manager_for(probe)); // outcome via on_result()
/// ```
#[derive(Debug)]
pub struct Tree {
    root: Arc<Node>,
    trace: Trace,
}

impl Tree {
    /// An empty tree with tracing disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trace(Trace::disabled())
    }

    /// An empty tree whose operations log through `trace`.
    #[must_use]
    pub fn with_trace(trace: Trace) -> Self {
        Self {
            root: Node::new_root(),
            trace,
        }
    }

    /// The root node, for use with the [`crate::ops`] entry points.
    #[must_use]
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Look up the manager's bound value; outcome via
    /// [`OperationManager::on_result`].
    pub fn search(&self, manager: &Arc<dyn OperationManager>) {
        ops::search(&self.root, manager, None, &self.trace);
    }

    /// Insert the manager's bound value; outcome via
    /// [`OperationManager::on_result`].
    pub fn insert(&self, manager: &Arc<dyn OperationManager>) {
        ops::insert(&self.root, manager, None, None, &self.trace);
    }

    /// Delete the manager's bound value; a miss is an ordinary outcome.
    pub fn delete(&self, manager: &Arc<dyn OperationManager>) {
        ops::delete(&self.root, manager, None, None, false, &self.trace);
    }

    /// Ascending iterator over value handles. Requires quiescence.
    #[must_use]
    pub fn scan(&self) -> Scan {
        Scan::new(&self.root)
    }

    /// Verify every structural invariant and return the value count.
    ///
    /// Requires quiescence. Checks, for every node: BST ordering (via
    /// [`OperationManager::compare_handles`]), `weight` within `{-1, 0, 1}`,
    /// both pending counters drained, and boundary caches equal to the true
    /// subtree minimum / maximum.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violated invariant. A
    /// violation at quiescence is a defect in the tree, not in the caller.
    pub fn audit(&self, manager: &Arc<dyn OperationManager>) -> usize {
        audit_node(&self.root, manager).map_or(0, |summary| summary.count)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

struct Subtree {
    count: usize,
    min: ValueHandle,
    max: ValueHandle,
}

fn audit_node(node: &Arc<Node>, manager: &Arc<dyn OperationManager>) -> Option<Subtree> {
    let value = node.value();
    let (weight, pending) = node.balance();
    let bounds = node.boundaries();

    if value.is_empty() {
        assert!(
            weight == 0 && pending == [0, 0],
            "empty leaf carries weight state: weight {weight}, pending -{} +{}",
            pending[0],
            pending[1]
        );
        assert!(
            bounds[0].is_empty() && bounds[1].is_empty(),
            "empty leaf carries boundary caches {} and {}",
            bounds[0],
            bounds[1]
        );
        assert!(node.peek_child(0).is_none(), "empty leaf owns children");
        return None;
    }

    assert!(
        (-1..=1).contains(&weight),
        "node {} is out of balance at quiescence: weight {weight}",
        manager.describe_handle(value)
    );
    assert!(
        pending == [0, 0],
        "node {} has undrained pending adjustments -{} +{}",
        manager.describe_handle(value),
        pending[0],
        pending[1]
    );

    let left = node
        .peek_child(0)
        .expect("non-empty node is missing its children");
    let right = node
        .peek_child(1)
        .expect("non-empty node is missing its children");
    let left_summary = audit_node(&left, manager);
    let right_summary = audit_node(&right, manager);

    let mut count = 1;
    let mut min = value;
    let mut max = value;
    if let Some(summary) = &left_summary {
        assert!(
            manager.compare_handles(summary.max, value) == Ordering::Less,
            "left subtree of {} reaches up to {}",
            manager.describe_handle(value),
            manager.describe_handle(summary.max)
        );
        count += summary.count;
        min = summary.min;
    }
    if let Some(summary) = &right_summary {
        assert!(
            manager.compare_handles(summary.min, value) == Ordering::Greater,
            "right subtree of {} reaches down to {}",
            manager.describe_handle(value),
            manager.describe_handle(summary.min)
        );
        count += summary.count;
        max = summary.max;
    }
    assert!(
        bounds[0] == min && bounds[1] == max,
        "boundary caches of {} are {} and {}, expected {} and {}",
        manager.describe_handle(value),
        bounds[0],
        bounds[1],
        manager.describe_handle(min),
        manager.describe_handle(max)
    );

    Some(Subtree { count, min, max })
}
