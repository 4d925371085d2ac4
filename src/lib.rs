//! # `wbtree`
//!
//! A concurrent, weight-balanced binary search tree over externally stored
//! values.
//!
//! Many tasks may probe and mutate the same tree simultaneously; there is
//! no global lock. The tree keeps logarithmic height through asynchronous,
//! self-healing rebalances and gives any reader holding a valid lock a
//! consistent ordering view.
//!
//! ## What the tree stores
//!
//! Nothing, directly. Values live in caller-owned storage and the tree holds
//! opaque [`ValueHandle`]s; every ordering, storage, and scheduling decision
//! goes through the per-operation [`OperationManager`] capability. That
//! makes the core reusable by anything that can number and order its values.
//! The motivating workload is a batch matcher correlating inbound records
//! against a catalog from many tasks at once.
//!
//! ## Concurrency model
//!
//! | Mechanism | Purpose |
//! |-----------|---------|
//! | Lock coupling | descents cannot overtake or observe half-updated edges |
//! | Lock order: boundaries → node → weight, root-to-leaf | deadlock freedom |
//! | Pending-adjustment counters | rebalance checks see in-flight intentions |
//! | Deferred weight unwind | outcome-dependent deltas settle on the way out |
//! | Start gates | parents wait for delegates to *start*, never to finish |
//!
//! Rebalancing moves values, not pointers: an AVL-style single rotation is
//! expressed as one value pulled up plus a background insert and a
//! background delete, so structural repair overlaps ordinary traffic.
//!
//! Operations suspend only while waiting for a lock or for a delegate to
//! start. There is no cancellation and no deadline; a production system
//! layering this tree adds those at the spawn capability, not inside the
//! core.
//!
//! ## Failure model
//!
//! Contract violations (a lock leak at operation exit, a pending counter
//! driven negative, a `must_match` delete missing its target, the empty
//! sentinel where a value is required) are defects and abort by panic.
//! Ordinary outcomes ("not found") are results, delivered through
//! [`OperationManager::on_result`].
//!
//! ## Quiescent helpers
//!
//! [`scan`](crate::scan) (ordered traversal) and [`Tree::audit`] (full
//! invariant verification) require a moment with no in-flight operations;
//! they read momentary snapshots and take no part in the locking protocol.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod guarded;
pub mod handle;
pub mod manager;
pub mod node;
pub mod ops;
pub mod scan;
pub mod trace;
pub mod tree;

mod adjust;
mod step;

pub use guarded::{Guarded, LockTally, StartGate};
pub use handle::ValueHandle;
pub use manager::{OperationManager, Task};
pub use ops::{FirstLockHook, RebalanceHook};
pub use scan::Scan;
pub use trace::{NoTrace, Trace, TraceSink, TracingSink};
pub use tree::Tree;

pub use node::Node;
