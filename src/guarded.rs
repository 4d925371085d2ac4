//! Guarded locks, lock accounting, and the one-shot start gate.
//!
//! Every mutable field group on a tree node sits behind a [`Guarded`] lock: a
//! mutual-exclusion wrapper that numbers each acquisition, reports contention
//! through the operation's [`Trace`], and charges every acquisition to the
//! operation's [`LockTally`]. The tally is the leak detector: each public
//! tree operation creates one, threads it through every lock it touches, and
//! calls [`LockTally::finish`] on exit; a non-zero balance means the
//! operation lost track of a lock, which is a fatal defect rather than a
//! recoverable condition.
//!
//! Locking is deliberately explicit (`lock()` / `unlock()`) rather than
//! RAII-guarded. Delete holds a boundary lock from the middle of its descent
//! until a deferred fix runs much later, and the unlock order at operation
//! exit is part of the protocol; explicit calls keep those transfers visible
//! at each site while the tally catches imbalances.
//!
//! [`StartGate`] is the one-shot start signal used by operations that spawn a
//! delegated operation and must wait only until it has *started* (taken its
//! first lock), never until it has completed.

use std::cell::{Cell, UnsafeCell};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::lock_api::RawMutex as _;
use parking_lot::{Condvar, Mutex, RawMutex};

use crate::trace::Trace;

// ============================================================================
//  LockTally
// ============================================================================

/// Per-operation count of currently held [`Guarded`] locks.
///
/// Created at the top of each tree operation and checked at its exit. The
/// counter lives on the operation's own task; it never crosses threads.
#[derive(Debug, Default)]
pub struct LockTally {
    held: Cell<i64>,
}

impl LockTally {
    /// A fresh tally with no locks charged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of locks currently charged.
    #[must_use]
    pub fn held(&self) -> i64 {
        self.held.get()
    }

    fn charge(&self) {
        self.held.set(self.held.get() + 1);
    }

    fn release(&self) {
        self.held.set(self.held.get() - 1);
    }

    /// Assert that every charged lock has been released.
    ///
    /// # Panics
    ///
    /// Panics when the balance is non-zero: the operation leaked (or
    /// over-released) a lock.
    pub fn finish(&self, operation: &str, trace: &Trace) {
        let held = self.held.get();
        if held != 0 {
            trace.log(|| format!("{operation} exited with a lock balance of {held}"));
            panic!("{operation} exited with a lock balance of {held}");
        }
    }
}

// ============================================================================
//  Guarded
// ============================================================================

/// A labeled mutual-exclusion wrapper around one protected field group.
///
/// Acquisitions are numbered so trace output can correlate "already locked"
/// contention reports with the acquisition that held the lock. Data access
/// goes through [`Guarded::with`] while the lock is held, or
/// [`Guarded::peek`] for momentary diagnostic reads that are not part of the
/// locking protocol.
pub struct Guarded<T> {
    label: &'static str,
    raw: RawMutex,
    /// Total acquisitions; the next acquisition gets `seq + 1`.
    seq: AtomicU64,
    /// Sequence number of the current holder, 0 when free.
    holder: AtomicU64,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is only reached through `with` (raw mutex held, see its
// contract) or `peek` (raw mutex held for the closure's duration), so all
// access to `T` is mutually excluded; `T: Send` is all that is required.
unsafe impl<T: Send> Send for Guarded<T> {}
// SAFETY: as above; shared references to `Guarded` only touch `T` under the
// raw mutex.
unsafe impl<T: Send> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    /// Wrap `data` behind a lock labeled for diagnostics.
    pub fn new(label: &'static str, data: T) -> Self {
        Self {
            label,
            raw: RawMutex::INIT,
            seq: AtomicU64::new(0),
            holder: AtomicU64::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// The diagnostic label this lock was created with.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Acquire the lock, charging it to `tally`.
    ///
    /// Logs a contention message when some other acquisition currently holds
    /// the lock, then blocks until it is available.
    pub fn lock(&self, tally: &LockTally, trace: &Trace) {
        let holder = self.holder.load(Ordering::Relaxed);
        if holder != 0 {
            trace.log(|| format!("mutex {} already locked, seq {holder}", self.label));
        }
        self.raw.lock();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.holder.store(seq, Ordering::Relaxed);
        tally.charge();
        trace.log(|| format!("mutex {} locked, seq {seq}", self.label));
    }

    /// Release the lock and refund it to `tally`.
    ///
    /// # Panics
    ///
    /// Panics when the lock is not held; an unlock without a matching lock
    /// is a protocol defect.
    pub fn unlock(&self, tally: &LockTally, trace: &Trace) {
        assert!(
            self.raw.is_locked(),
            "mutex {} unlocked while not held",
            self.label
        );
        self.holder.store(0, Ordering::Relaxed);
        // SAFETY: asserted held above; the caller is the holder by the
        // lock()/unlock() pairing discipline enforced through the tally.
        unsafe { self.raw.unlock() };
        tally.release();
        trace.log(|| format!("mutex {} unlocked", self.label));
    }

    /// Access the protected data while the lock is held.
    ///
    /// The caller must sit between a [`Guarded::lock`] and the matching
    /// [`Guarded::unlock`] on this lock; every call site in this crate does.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        debug_assert!(
            self.raw.is_locked(),
            "mutex {} accessed while not held",
            self.label
        );
        // SAFETY: the raw mutex is held by this operation (call sites are
        // bracketed by lock()/unlock()), so no other access to `data` can be
        // live, and `with` is never re-entered on the same lock.
        f(unsafe { &mut *self.data.get() })
    }

    /// Momentarily acquire the raw mutex and read the protected data.
    ///
    /// This is the quiescent-traversal and diagnostics read path: it takes no
    /// part in lock coupling, charges no tally, and never holds anything
    /// across a second acquisition.
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.raw.lock();
        // SAFETY: raw mutex held for the duration of `f`.
        let out = f(unsafe { &*self.data.get() });
        // SAFETY: acquired two lines up on this same thread.
        unsafe { self.raw.unlock() };
        out
    }
}

// Prints only the label and holder state; reaching the data would require
// taking the lock.
impl<T> std::fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guarded")
            .field("label", &self.label)
            .field("holder", &self.holder.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  StartGate
// ============================================================================

/// One-shot start signal between a spawning operation and its delegate.
///
/// The child signals exactly once, as its first-lock hook fires; the parent
/// waits exactly once. The parent deliberately does not learn about the
/// child's completion, only that the child holds its first lock and can no
/// longer be overtaken.
#[derive(Debug, Default)]
pub struct StartGate {
    started: Mutex<bool>,
    cond: Condvar,
}

impl StartGate {
    /// A gate that has not been signaled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the gate as passed and wake the waiter.
    pub fn signal(&self) {
        let mut started = self.started.lock();
        *started = true;
        self.cond.notify_all();
    }

    /// Block until [`StartGate::signal`] has been called.
    pub fn wait(&self) {
        let mut started = self.started.lock();
        while !*started {
            self.cond.wait(&mut started);
        }
    }
}
