//! Insertion.
//!
//! Insert descends with both boundary locks and the node lock coupled from
//! parent to child. Each non-equal step leaves two traces of itself behind:
//! an optimistic pending-adjustment bump on the side being entered (visible
//! to concurrent rebalance checks immediately) and a queued weight entry
//! resolved once the outcome is known: committed if the value was new,
//! withdrawn if a deeper step found it already present. Boundary caches are
//! the exception: a boundary that the new value out-flanks is updated on the
//! spot, while both of the step's boundary locks are still held.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::adjust::{drain, WeightEntry};
use crate::guarded::LockTally;
use crate::manager::OperationManager;
use crate::node::Node;
use crate::ops::{FirstLockHook, RebalanceHook};
use crate::step::{delta_of, descend, side_of};
use crate::trace::Trace;

/// Insert the manager's bound value.
///
/// Reports `on_result(handle, true)` when an equal value already exists
/// (`handle` being the existing value), or `on_result(handle, false)` with
/// the freshly stored handle after materializing a leaf. On unwind, queued
/// weight adjustments fire deepest-node-first and the rebalance trigger is
/// re-checked at every touched ancestor.
pub fn insert(
    root: &Arc<Node>,
    manager: &Arc<dyn OperationManager>,
    on_first_lock: Option<FirstLockHook>,
    on_rebalance: Option<&RebalanceHook>,
    trace: &Trace,
) {
    let trace = trace.scoped(&format!("insert {}", manager.describe_current()));
    let tally = LockTally::new();
    let mut queued: Vec<WeightEntry> = Vec::new();

    root.bounds[0].lock(&tally, &trace);
    root.bounds[1].lock(&tally, &trace);
    root.lock.lock(&tally, &trace);
    if let Some(hook) = on_first_lock {
        hook();
    }

    let (end, matched) = descend(
        root,
        |node| {
            let ordering = node
                .lock
                .with(|slots| manager.compare_current_to(slots.value()));
            if ordering != Ordering::Equal {
                let side = side_of(ordering);
                // Promise, before anything can observe this subtree, that
                // its weight may change; settled during the unwind.
                node.bump_pending(side, &tally, &trace);
                queued.push(WeightEntry::new(node, side, delta_of(ordering)));

                let out_flanks = node.bounds[side]
                    .with(|bound| manager.compare_current_to(*bound))
                    == ordering;
                if out_flanks {
                    let handle = manager.store_value();
                    node.bounds[side].with(|bound| *bound = handle);
                    trace.log(|| format!("boundary {side} extended to {handle}"));
                }

                let child = node.lock.with(|slots| Arc::clone(slots.child(side)));
                child.bounds[0].lock(&tally, &trace);
                child.bounds[1].lock(&tally, &trace);
                node.bounds[0].unlock(&tally, &trace);
                node.bounds[1].unlock(&tally, &trace);
            }
            ordering
        },
        &tally,
        &trace,
    );

    if !matched {
        let handle = manager.store_value();
        Node::materialize(&end, handle);
        trace.log(|| format!("materialized leaf {handle}"));
    }
    let result = end.lock.with(|slots| slots.value());
    manager.on_result(result, matched);

    end.bounds[0].unlock(&tally, &trace);
    end.bounds[1].unlock(&tally, &trace);
    end.lock.unlock(&tally, &trace);

    drain(
        queued.into_iter().rev(),
        !matched,
        manager,
        on_rebalance,
        &tally,
        &trace,
    );
    tally.finish("insert", &trace);
}
