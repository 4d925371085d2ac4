//! The capability boundary between the tree and caller-owned storage.
//!
//! The tree core is fully generic over where values live and how they order:
//! it only ever sees [`ValueHandle`]s and routes every storage or ordering
//! decision through an [`OperationManager`]. One manager instance is bound to
//! one operation's value ("the current value"); derived operations (the
//! replacement delete spawned by [`delete`](crate::ops::delete), the insert
//! and delete spawned by a rebalance) get their own instance via
//! [`OperationManager::clone_with_handle`].
//!
//! Managers are shared as `Arc<dyn OperationManager>` so that spawned tasks
//! can carry them across task boundaries without the tree knowing anything
//! about the scheduler behind [`OperationManager::spawn`].

use std::cmp::Ordering;
use std::sync::Arc;

use crate::handle::ValueHandle;

/// A unit of work handed to [`OperationManager::spawn`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Capability contract the tree requires from its caller.
///
/// Implementations own the value storage, the total order over stored
/// values, and the task scheduler. The tree calls these methods under its
/// own locks, so implementations should not call back into the same tree
/// synchronously.
pub trait OperationManager: Send + Sync {
    /// Persist the operation's bound value if not already stored.
    ///
    /// Idempotent per operation instance: repeated calls return the same
    /// handle. Must never return [`ValueHandle::EMPTY`].
    fn store_value(&self) -> ValueHandle;

    /// Overwrite the stored value behind `handle` with the operation's value.
    ///
    /// Not called by the tree core; part of the contract for collaborating
    /// glue that reacts to [`OperationManager::on_result`].
    fn update_value(&self, handle: ValueHandle);

    /// Drop the stored value behind `handle` from external storage.
    ///
    /// Not called by the tree core; see [`OperationManager::update_value`].
    fn delete_value(&self, handle: ValueHandle);

    /// Order the operation's bound value against the stored value `handle`.
    fn compare_current_to(&self, handle: ValueHandle) -> Ordering;

    /// Order two stored values.
    fn compare_handles(&self, a: ValueHandle, b: ValueHandle) -> Ordering;

    /// Diagnostic description of the operation's bound value.
    fn describe_current(&self) -> String;

    /// Diagnostic description of a stored value.
    fn describe_handle(&self, handle: ValueHandle) -> String;

    /// A new manager bound to the stored value `handle`, for launching a
    /// derived operation on a different value.
    fn clone_with_handle(&self, handle: ValueHandle) -> Arc<dyn OperationManager>;

    /// Run `task` concurrently with the caller.
    ///
    /// No ordering or start-time guarantee relative to the spawning
    /// operation; tasks that need a happens-after edge use a
    /// [`StartGate`](crate::guarded::StartGate) through the first-lock hook.
    fn spawn(&self, task: Task);

    /// Deliver the outcome of a search, insert, or delete.
    ///
    /// `handle` is the found or inserted value, or [`ValueHandle::EMPTY`]
    /// when there is none to report (not-found search, any delete).
    fn on_result(&self, handle: ValueHandle, matched: bool);
}
