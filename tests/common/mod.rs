//! Shared test harness: an integer-backed capability implementation and a
//! spawned-task tracker so tests can wait for background work to drain.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once, OnceLock};
use std::thread;

use parking_lot::{Condvar, Mutex};
use wbtree::{OperationManager, Task, Trace, TracingSink, Tree, ValueHandle};

// ============================================================================
//  Harness
// ============================================================================

/// Integer value storage shared by every operation in a test, plus a count of
/// in-flight spawned tasks.
///
/// Handles are indices into an append-only vector; deleted values simply stay
/// in the vector, unreferenced by the tree.
pub struct Harness {
    values: Mutex<Vec<i64>>,
    active: Mutex<usize>,
    idle: Condvar,
    task_panic: Mutex<Option<String>>,
}

impl Harness {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(Vec::new()),
            active: Mutex::new(0),
            idle: Condvar::new(),
            task_panic: Mutex::new(None),
        })
    }

    /// The stored integer behind `handle`.
    pub fn resolve(&self, handle: ValueHandle) -> i64 {
        self.values.lock()[usize::try_from(handle.index()).unwrap()]
    }

    fn store(&self, value: i64) -> ValueHandle {
        let mut values = self.values.lock();
        values.push(value);
        ValueHandle::new((values.len() - 1) as u64)
    }

    /// Run `task` on its own thread, counted until it finishes.
    ///
    /// A panicking task is recorded rather than silently dying with its
    /// detached thread; [`Harness::wait_idle`] re-raises it on the waiting
    /// test.
    pub fn launch(self: &Arc<Self>, task: Task) {
        *self.active.lock() += 1;
        let harness = Arc::clone(self);
        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            if let Err(payload) = outcome {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| String::from("non-string panic payload"));
                let mut task_panic = harness.task_panic.lock();
                if task_panic.is_none() {
                    *task_panic = Some(message);
                }
            }
            *harness.active.lock() -= 1;
            harness.idle.notify_all();
        });
    }

    /// Block until every spawned task, including transitively spawned
    /// rebalances and delegated deletes, has finished.
    ///
    /// Panics if any of them panicked, carrying the first recorded message.
    pub fn wait_idle(&self) {
        let mut active = self.active.lock();
        while *active > 0 {
            self.idle.wait(&mut active);
        }
        drop(active);
        if let Some(message) = self.task_panic.lock().take() {
            panic!("spawned task panicked: {message}");
        }
    }

    // Convenience wrappers returning the operation so tests can inspect the
    // outcome delivered through on_result.

    pub fn insert(self: &Arc<Self>, tree: &Tree, value: i64) -> Arc<IntOp> {
        let op = IntOp::new(self, value);
        tree.insert(&op.as_manager());
        op
    }

    pub fn delete(self: &Arc<Self>, tree: &Tree, value: i64) -> Arc<IntOp> {
        let op = IntOp::new(self, value);
        tree.delete(&op.as_manager());
        op
    }

    pub fn search(self: &Arc<Self>, tree: &Tree, value: i64) -> Arc<IntOp> {
        let op = IntOp::new(self, value);
        tree.search(&op.as_manager());
        op
    }

    /// Full invariant audit; any manager bound to this harness will do.
    pub fn audit(self: &Arc<Self>, tree: &Tree) -> usize {
        tree.audit(&IntOp::new(self, 0).as_manager())
    }

    /// The tree's values in scan order, resolved back to integers.
    pub fn contents(self: &Arc<Self>, tree: &Tree) -> Vec<i64> {
        tree.scan().map(|handle| self.resolve(handle)).collect()
    }
}

// ============================================================================
//  IntOp
// ============================================================================

/// One operation's capability, bound to a single integer value.
pub struct IntOp {
    harness: Arc<Harness>,
    value: i64,
    stored: OnceLock<ValueHandle>,
    outcome: Mutex<Option<(ValueHandle, bool)>>,
}

impl IntOp {
    pub fn new(harness: &Arc<Harness>, value: i64) -> Arc<Self> {
        Arc::new(Self {
            harness: Arc::clone(harness),
            value,
            stored: OnceLock::new(),
            outcome: Mutex::new(None),
        })
    }

    pub fn as_manager(self: &Arc<Self>) -> Arc<dyn OperationManager> {
        Arc::clone(self) as Arc<dyn OperationManager>
    }

    /// The delivered `(handle, matched)` outcome.
    ///
    /// Panics when the operation has not reported yet; every tree entry point
    /// reports before returning to its caller.
    pub fn outcome(&self) -> (ValueHandle, bool) {
        (*self.outcome.lock()).expect("operation has not reported its outcome")
    }

    pub fn matched(&self) -> bool {
        self.outcome().1
    }
}

impl OperationManager for IntOp {
    fn store_value(&self) -> ValueHandle {
        *self.stored.get_or_init(|| self.harness.store(self.value))
    }

    fn update_value(&self, handle: ValueHandle) {
        self.harness.values.lock()[usize::try_from(handle.index()).unwrap()] = self.value;
    }

    fn delete_value(&self, _handle: ValueHandle) {
        // Storage is append-only in tests; unreferenced slots just linger.
    }

    fn compare_current_to(&self, handle: ValueHandle) -> Ordering {
        self.value.cmp(&self.harness.resolve(handle))
    }

    fn compare_handles(&self, a: ValueHandle, b: ValueHandle) -> Ordering {
        self.harness.resolve(a).cmp(&self.harness.resolve(b))
    }

    fn describe_current(&self) -> String {
        self.value.to_string()
    }

    fn describe_handle(&self, handle: ValueHandle) -> String {
        format!("{} ({handle})", self.harness.resolve(handle))
    }

    fn clone_with_handle(&self, handle: ValueHandle) -> Arc<dyn OperationManager> {
        let op = IntOp::new(&self.harness, self.harness.resolve(handle));
        // The derived operation's value is already stored.
        let _ = op.stored.set(handle);
        op
    }

    fn spawn(&self, task: Task) {
        self.harness.launch(task);
    }

    fn on_result(&self, handle: ValueHandle, matched: bool) {
        *self.outcome.lock() = Some((handle, matched));
    }
}

// ============================================================================
//  Tracing
// ============================================================================

/// A tree whose operations log through `tracing`; filter with
/// `RUST_LOG=wbtree=trace`.
pub fn traced_tree() -> Tree {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    Tree::with_trace(Trace::new(Arc::new(TracingSink)))
}
