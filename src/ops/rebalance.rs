//! Asynchronous structural repair.
//!
//! Nobody rotates pointers here. A rebalance moves *values*: the heavier
//! side's extreme boundary facing the root becomes the node's new value, the
//! old value is re-inserted into the lighter side, and the new value is
//! deleted from where it came, both as spawned background operations the
//! rebalance only waits to have started. The net effect is an AVL-style
//! single rotation whose legs settle concurrently with everything else.
//!
//! Triggering is two-tiered on purpose. [`maybe_spawn_rebalance`] fires on
//! the optimistic band (`weight + pending[+] < -1` or
//! `weight - pending[-] > 1`), deferring while in-flight operations might
//! still self-correct the imbalance; the spawned task then re-confirms on
//! the strict band (`<= -2` / `>= 2`) under the weight lock before touching
//! anything. Collapsing the two bands changes rebalance frequency; they are
//! kept exactly as-is.

use std::sync::Arc;

use crate::guarded::{LockTally, StartGate};
use crate::manager::OperationManager;
use crate::node::{Node, PENDING_NEG, PENDING_POS};
use crate::ops::{delete, insert, RebalanceHook};
use crate::trace::Trace;

/// Spawn a rebalance of `node` if the optimistic trigger band says so and no
/// rebalance is already in flight.
///
/// Runs entirely under the node's weight lock; setting `rebalancing` there
/// is what keeps triggers from duplicating.
pub(crate) fn maybe_spawn_rebalance(
    node: &Arc<Node>,
    manager: &Arc<dyn OperationManager>,
    on_rebalance: Option<&RebalanceHook>,
    tally: &LockTally,
    trace: &Trace,
) {
    node.weight.lock(tally, trace);
    let snapshot = node.weight.with(|balance| {
        let trigger = !balance.rebalancing
            && (balance.weight + balance.pending[PENDING_POS] < -1
                || balance.weight - balance.pending[PENDING_NEG] > 1);
        if trigger {
            balance.rebalancing = true;
        }
        (trigger, balance.weight, balance.pending)
    });
    if snapshot.0 {
        trace.log(|| {
            format!(
                "queueing rebalance: weight {}, pending -{} +{}",
                snapshot.1, snapshot.2[0], snapshot.2[1]
            )
        });
        let target = Arc::clone(node);
        let sub_manager = Arc::clone(manager);
        let sub_hook = on_rebalance.cloned();
        let sub_trace = trace.clone();
        manager.spawn(Box::new(move || {
            rebalance(&target, &sub_manager, sub_hook.as_ref(), &sub_trace);
        }));
    }
    node.weight.unlock(tally, trace);
}

/// Rebalance one node.
///
/// Runs on its own task with no guaranteed scheduling relative to concurrent
/// operations. Anything may have happened between trigger and run: if the
/// imbalance resolved itself, or concurrent deletes emptied the node
/// entirely, the task clears `rebalancing` and walks away. After its spawned
/// legs have started, clears `rebalancing` and immediately re-checks the
/// trigger band, since the legs themselves shift weight.
///
/// # Panics
///
/// Panics when the heavier side's boundary pull yields the empty sentinel,
/// which the confirmation band rules out for any live node.
pub fn rebalance(
    node: &Arc<Node>,
    manager: &Arc<dyn OperationManager>,
    on_rebalance: Option<&RebalanceHook>,
    trace: &Trace,
) {
    let tally = LockTally::new();

    node.lock.lock(&tally, trace);
    let seed = node.lock.with(|slots| slots.value());
    if seed.is_empty() {
        // The node was deleted out from under the queued task; whatever
        // imbalance triggered it is gone with the subtree.
        trace.log(|| String::from("rebalance target emptied before the task ran"));
        node.weight.lock(&tally, trace);
        node.weight.with(|balance| balance.rebalancing = false);
        node.weight.unlock(&tally, trace);
        node.lock.unlock(&tally, trace);
        tally.finish("rebalance", trace);
        return;
    }
    let trace = trace.scoped(&format!("rebalance {}", manager.describe_handle(seed)));

    node.weight.lock(&tally, &trace);
    let confirmed = node.weight.with(|balance| {
        balance.weight + balance.pending[PENDING_POS] <= -2
            || balance.weight - balance.pending[PENDING_NEG] >= 2
    });
    if confirmed {
        if let Some(hook) = on_rebalance {
            hook();
        }
        // Confirmation implies |weight| >= 2, so the sign picks the side.
        let heavy = usize::from(node.weight.with(|balance| balance.weight) > 0);
        let light = 1 - heavy;
        let heavy_child = node.lock.with(|slots| Arc::clone(slots.child(heavy)));
        let light_child = node.lock.with(|slots| Arc::clone(slots.child(light)));

        let new_value = heavy_child.boundary(light, &tally, &trace);
        assert!(
            !new_value.is_empty(),
            "rebalance must not install the empty sentinel as a node value"
        );
        let old_value = node.lock.with(|slots| {
            let old = slots.value();
            slots.set_value(new_value);
            old
        });
        node.weight
            .with(|balance| balance.weight += if light == 1 { 2 } else { -2 });
        trace.log(|| format!("moved {new_value} up, pushing {old_value} toward side {light}"));

        let insert_gate = Arc::new(StartGate::new());
        {
            let started = Arc::clone(&insert_gate);
            let child = Arc::clone(&light_child);
            let sub_manager = manager.clone_with_handle(old_value);
            let sub_hook = on_rebalance.cloned();
            let sub_trace = trace.clone();
            manager.spawn(Box::new(move || {
                insert(
                    &child,
                    &sub_manager,
                    Some(Box::new(move || started.signal())),
                    sub_hook.as_ref(),
                    &sub_trace,
                );
            }));
        }
        let delete_gate = Arc::new(StartGate::new());
        {
            let started = Arc::clone(&delete_gate);
            let child = Arc::clone(&heavy_child);
            let sub_manager = manager.clone_with_handle(new_value);
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
        }
        // Wait for both legs to have started; their completion is their own
        // business.
        delete_gate.wait();
        insert_gate.wait();
    }
    node.weight.unlock(&tally, &trace);

    node.weight.lock(&tally, &trace);
    node.weight.with(|balance| balance.rebalancing = false);
    node.weight.unlock(&tally, &trace);
    maybe_spawn_rebalance(node, manager, on_rebalance, &tally, &trace);
    node.lock.unlock(&tally, &trace);

    tally.finish("rebalance", &trace);
}
