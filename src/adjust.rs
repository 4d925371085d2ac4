//! Deferred weight adjustments.
//!
//! Insert and delete cannot know, while descending, whether they will
//! ultimately change the tree: the value may turn out to already exist
//! (insert) or to be absent (delete). Each non-equal comparison step
//! therefore bumps the touched node's pending counter immediately (the
//! visible promise that weight "may" change) and queues a [`WeightEntry`];
//! once the outcome is known the queue is drained, either committing the
//! weight delta or cancelling the optimistic bump, and re-checking the
//! rebalance trigger at every touched ancestor.
//!
//! Drain order is part of the protocol: insert drains deepest-node-first,
//! delete drains shallowest-first. [`drain`] takes whichever iteration the
//! caller built.

use std::sync::Arc;

use crate::guarded::LockTally;
use crate::manager::OperationManager;
use crate::node::Node;
use crate::ops::{maybe_spawn_rebalance, RebalanceHook};
use crate::trace::Trace;

/// One queued, not-yet-committed weight adjustment.
pub(crate) struct WeightEntry {
    node: Arc<Node>,
    /// Pending slot that was optimistically bumped at this step.
    pending_sign: usize,
    /// Weight delta to apply if the operation commits.
    delta: i64,
}

impl WeightEntry {
    pub(crate) fn new(node: &Arc<Node>, pending_sign: usize, delta: i64) -> Self {
        Self {
            node: Arc::clone(node),
            pending_sign,
            delta,
        }
    }
}

/// Resolve queued adjustments after the operation's outcome is known.
///
/// With `commit` the delta is applied and the matching pending slot drained;
/// without it the optimistic bump is withdrawn. Either way the rebalance
/// trigger is re-evaluated at each node, since a withdrawn bump can be
/// exactly what un-masks a real imbalance.
pub(crate) fn drain<I>(
    entries: I,
    commit: bool,
    manager: &Arc<dyn OperationManager>,
    on_rebalance: Option<&RebalanceHook>,
    tally: &LockTally,
    trace: &Trace,
) where
    I: Iterator<Item = WeightEntry>,
{
    for entry in entries {
        if commit {
            entry.node.commit_weight(entry.delta, tally, trace);
        } else {
            entry.node.cancel_pending(entry.pending_sign, tally, trace);
        }
        trace.log(|| {
            let (weight, pending) = entry.node.balance();
            format!(
                "adjusted weights for {}: weight {weight}, pending -{} +{}",
                entry.node.value(),
                pending[0],
                pending[1],
            )
        });
        maybe_spawn_rebalance(&entry.node, manager, on_rebalance, tally, trace);
    }
}
