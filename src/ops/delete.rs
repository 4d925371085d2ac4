//! Deletion.
//!
//! Delete mirrors insert's locking but threads two extra pieces of state
//! down the path: the closest predecessor and successor seen so far, and a
//! queue of boundary fixes. When the value being deleted turns out to be a
//! path node's cached boundary, that boundary lock is *retained* past the
//! step, blocking boundary readers, until the match point can replace the
//! cache with the closest value from the opposite side. Finding the target's
//! boundary on the path also proves the value exists below, so the operation
//! silently upgrades itself to `must_match`.
//!
//! Removal itself is O(1) for a node with two empty children (reset to the
//! empty-leaf state). Otherwise the node's value is replaced by the extreme
//! boundary of the heavier side and the *actual* removal of that replacement
//! is delegated to a freshly spawned `must_match` delete on the child; the
//! parent waits only until the delegate has started, never until it
//! finishes, so the structural fix proceeds concurrently with the parent's
//! return.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::adjust::{drain, WeightEntry};
use crate::guarded::{LockTally, StartGate};
use crate::handle::ValueHandle;
use crate::manager::OperationManager;
use crate::node::{Node, PENDING_POS};
use crate::ops::{FirstLockHook, RebalanceHook};
use crate::step::{delta_of, descend, side_of};
use crate::trace::Trace;

/// Delete the manager's bound value.
///
/// Reports `on_result(EMPTY, matched)`; deletes never surface a handle.
/// A miss is an ordinary outcome unless `must_match` is set (used when the
/// caller has already proved the value exists, as the delegated
/// replacement delete and rebalance do), in which case it is fatal.
///
/// # Panics
///
/// Panics when `must_match` is set (explicitly, or implicitly by the
/// boundary proof above) and no match is found, or when a replacement pull
/// would install the empty sentinel.
pub fn delete(
    root: &Arc<Node>,
    manager: &Arc<dyn OperationManager>,
    on_first_lock: Option<FirstLockHook>,
    on_rebalance: Option<&RebalanceHook>,
    must_match: bool,
    trace: &Trace,
) {
    let trace = trace.scoped(&format!("delete {}", manager.describe_current()));
    let tally = LockTally::new();
    let mut queued: Vec<WeightEntry> = Vec::new();
    // Path nodes whose `side` boundary cache named the deleted value; their
    // boundary locks stay held until the fix runs at the match point.
    let mut bound_fixes: Vec<(Arc<Node>, usize)> = Vec::new();
    let mut closest = [ValueHandle::EMPTY; 2];
    let mut must_match = must_match;

    root.bounds[0].lock(&tally, &trace);
    root.bounds[1].lock(&tally, &trace);
    root.lock.lock(&tally, &trace);
    if let Some(hook) = on_first_lock {
        hook();
    }

    let (end, matched) = descend(
        root,
        |node| {
            let value = node.lock.with(|slots| slots.value());
            let ordering = manager.compare_current_to(value);
            if ordering != Ordering::Equal {
                let side = side_of(ordering);
                // Deleting below `side` shrinks it, so the weight may drift
                // toward the opposite sign.
                node.bump_pending(1 - side, &tally, &trace);
                queued.push(WeightEntry::new(node, 1 - side, -delta_of(ordering)));

                let is_bound = node.bounds[side]
                    .with(|bound| manager.compare_current_to(*bound))
                    == Ordering::Equal;
                if is_bound {
                    // The cache names the target, so the target exists in
                    // this subtree; keep the boundary lock until the fix.
                    must_match = true;
                    bound_fixes.push((Arc::clone(node), side));
                } else {
                    node.bounds[side].unlock(&tally, &trace);
                }

                closest[1 - side] = value;
                let child = node.lock.with(|slots| Arc::clone(slots.child(side)));
                child.bounds[0].lock(&tally, &trace);
                child.bounds[1].lock(&tally, &trace);
                node.bounds[1 - side].unlock(&tally, &trace);
            }
            ordering
        },
        &tally,
        &trace,
    );

    if matched {
        let (left, right) = end
            .lock
            .with(|slots| (Arc::clone(slots.child(0)), Arc::clone(slots.child(1))));
        left.lock.lock(&tally, &trace);
        right.lock.lock(&tally, &trace);
        let left_empty = left.lock.with(|slots| slots.value().is_empty());
        let right_empty = right.lock.with(|slots| slots.value().is_empty());

        // The children know the true closest values better than the path did.
        if !left_empty {
            closest[0] = left.boundary(1, &tally, &trace);
        }
        if !right_empty {
            closest[1] = right.boundary(0, &tally, &trace);
        }
        for (node, side) in bound_fixes.drain(..) {
            let stand_in = closest[1 - side];
            node.bounds[side].with(|bound| *bound = stand_in);
            node.bounds[side].unlock(&tally, &trace);
            trace.log(|| format!("boundary {side} now {stand_in}"));
        }

        if left_empty && right_empty {
            left.lock.unlock(&tally, &trace);
            right.lock.unlock(&tally, &trace);
            let removed = end.lock.with(|slots| {
                let value = slots.value();
                slots.clear();
                value
            });
            end.bounds[0].with(|bound| *bound = ValueHandle::EMPTY);
            end.bounds[1].with(|bound| *bound = ValueHandle::EMPTY);
            trace.log(|| format!("deleted leaf {removed}"));
        } else {
            // Pull the replacement from the heavier side; a tie with
            // positive in-flight drift also goes right.
            end.weight.lock(&tally, &trace);
            let side = end.weight.with(|balance| {
                if balance.weight > 0
                    || (balance.weight == 0 && balance.pending[PENDING_POS] > 0)
                {
                    balance.weight -= 1;
                    1
                } else {
                    balance.weight += 1;
                    0
                }
            });
            end.weight.unlock(&tally, &trace);

            let donor = if side == 1 { &right } else { &left };
            let other = if side == 1 { &left } else { &right };
            let replacement = donor.boundary(1 - side, &tally, &trace);
            assert!(
                !replacement.is_empty(),
                "delete must not install the empty sentinel as a replacement value"
            );
            end.lock.with(|slots| slots.set_value(replacement));
            if other.lock.with(|slots| slots.value().is_empty()) {
                end.bounds[1 - side].with(|bound| *bound = replacement);
            }

            let gate = Arc::new(StartGate::new());
            let started = Arc::clone(&gate);
            let child = Arc::clone(donor);
            let sub_manager = manager.clone_with_handle(replacement);
            let sub_hook = on_rebalance.cloned();
            let sub_trace = trace.clone();
            manager.spawn(Box::new(move || {
                delete(
                    &child,
                    &sub_manager,
                    Some(Box::new(move || started.signal())),
                    sub_hook.as_ref(),
                    true,
                    &sub_trace,
                );
            }));
            left.lock.unlock(&tally, &trace);
            right.lock.unlock(&tally, &trace);
            gate.wait();
            trace.log(|| format!("replaced deleted value with {replacement}"));
        }
    } else if must_match {
        trace.log(|| String::from("failed to delete a value known to exist"));
        panic!("failed to delete a value known to exist");
    } else {
        trace.log(|| String::from("value to delete not found"));
    }

    manager.on_result(ValueHandle::EMPTY, matched);
    end.bounds[0].unlock(&tally, &trace);
    end.bounds[1].unlock(&tally, &trace);
    end.lock.unlock(&tally, &trace);

    drain(
        queued.into_iter(),
        matched,
        manager,
        on_rebalance,
        &tally,
        &trace,
    );
    tally.finish("delete", &trace);
}
