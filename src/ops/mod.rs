//! The tree's entry points: search, insert, delete, and rebalance.
//!
//! Each operation runs on whatever task invokes it and follows one locking
//! discipline: boundary locks (side 0, then side 1) before the node lock
//! before the weight lock, strictly root-to-leaf, with lock coupling across
//! every descent step. Every operation settles its result through
//! [`OperationManager::on_result`](crate::OperationManager::on_result) and
//! asserts on exit that it released every lock it took.

use std::sync::Arc;

mod delete;
mod insert;
mod rebalance;
mod search;

pub use delete::delete;
pub use insert::insert;
pub use rebalance::rebalance;
pub use search::search;

pub(crate) use rebalance::maybe_spawn_rebalance;

/// Callback fired exactly once, right after an operation's first lock is
/// acquired.
///
/// Composed protocols use it to release a caller-held resource and thereby
/// pin a happens-after edge between the caller's prior action and this
/// operation becoming visible in the tree; delegated operations use it to
/// signal their [`StartGate`](crate::guarded::StartGate).
pub type FirstLockHook = Box<dyn FnOnce() + Send>;

/// Observation hook invoked each time a rebalance commits to restructuring.
///
/// Cloned into every spawned operation so that transitively triggered
/// rebalances report too. Intended for tests and instrumentation.
pub type RebalanceHook = Arc<dyn Fn() + Send + Sync>;
