//! Lock-coupled descent.
//!
//! All three entry points walk the tree through [`descend`]: evaluate the
//! visitor against the current node, move left on `Less`, right on
//! `Greater`, stop on `Equal` or on reaching an empty leaf. Before the walk
//! moves to a child, the child's node lock is acquired and only then is the
//! current node's lock released, so no operation can overtake another on
//! the same edge, and no operation ever observes a half-updated edge.
//!
//! The visitor is where insert and delete hang their per-step bookkeeping
//! (optimistic pending bumps, boundary-lock coupling, deferred adjustments);
//! search passes a bare comparison.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::guarded::LockTally;
use crate::node::Node;
use crate::trace::Trace;

/// Tree side selected by a non-equal comparison: left for `Less`.
#[inline]
pub(crate) fn side_of(ordering: Ordering) -> usize {
    usize::from(ordering == Ordering::Greater)
}

/// Weight delta an insert on this comparison's side would contribute.
#[inline]
pub(crate) fn delta_of(ordering: Ordering) -> i64 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Descend from `start`, whose node lock the caller already holds.
///
/// Returns the final node and whether the visitor reported a match. The
/// final node's lock is still held on return (the caller owns its release);
/// every intermediate lock has been released by the coupling handoff.
pub(crate) fn descend<F>(
    start: &Arc<Node>,
    mut visit: F,
    tally: &LockTally,
    trace: &Trace,
) -> (Arc<Node>, bool)
where
    F: FnMut(&Arc<Node>) -> Ordering,
{
    let mut current = Arc::clone(start);
    loop {
        if current.lock.with(|slots| slots.value().is_empty()) {
            return (current, false);
        }
        let side = match visit(&current) {
            Ordering::Equal => return (current, true),
            ordering => side_of(ordering),
        };
        let next = current.lock.with(|slots| Arc::clone(slots.child(side)));
        next.lock.lock(tally, trace);
        current.lock.unlock(tally, trace);
        current = next;
    }
}
