//! Point lookup.

use std::sync::Arc;

use crate::guarded::LockTally;
use crate::manager::OperationManager;
use crate::node::Node;
use crate::ops::FirstLockHook;
use crate::step::descend;
use crate::trace::Trace;

/// Look up the manager's bound value.
///
/// Read-only: takes node locks for the coupled descent but never touches
/// weight or boundary state. The outcome, either the found handle and `true`
/// or [`ValueHandle::EMPTY`](crate::ValueHandle::EMPTY) and `false`, is
/// delivered through [`OperationManager::on_result`] before the final lock
/// is released, so a caller that observed the result can rely on the search
/// having happened before any operation that reaches the same node later.
pub fn search(
    root: &Arc<Node>,
    manager: &Arc<dyn OperationManager>,
    on_first_lock: Option<FirstLockHook>,
    trace: &Trace,
) {
    let trace = trace.scoped(&format!("search {}", manager.describe_current()));
    let tally = LockTally::new();

    root.lock.lock(&tally, &trace);
    if let Some(hook) = on_first_lock {
        hook();
    }

    let (end, matched) = descend(
        root,
        |node| node.lock.with(|slots| manager.compare_current_to(slots.value())),
        &tally,
        &trace,
    );

    let result = end.lock.with(|slots| slots.value());
    trace.log(|| format!("finished with {result}, matched {matched}"));
    manager.on_result(result, matched);
    end.lock.unlock(&tally, &trace);

    tally.finish("search", &trace);
}
