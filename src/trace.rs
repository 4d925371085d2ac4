//! Lazy, scoped trace output.
//!
//! Tree operations describe what they are doing through a [`Trace`], which
//! wraps a caller-supplied [`TraceSink`]. Messages are built lazily: the
//! closure handed to [`Trace::log`] only runs when the sink reports itself
//! enabled, so a disabled sink costs one virtual call and no formatting.
//!
//! Each operation derives a scoped `Trace` carrying a prefix such as
//! `insert listing-4411`; nested operations (a rebalance spawning a delete,
//! that delete spawning a replacement delete) chain their prefixes, so a
//! single line tells the full story of which operation stack produced it.
//!
//! Two sinks ship with the crate: [`NoTrace`] (always disabled, the default)
//! and [`TracingSink`], which forwards to the `tracing` ecosystem under the
//! `wbtree` target so ordinary `RUST_LOG`-style filtering applies.

use std::sync::Arc;

/// Destination for trace messages.
///
/// `enabled()` is the cheap query consulted before any message is built;
/// `write()` receives fully formatted lines.
pub trait TraceSink: Send + Sync {
    /// Whether messages should be produced at all.
    fn enabled(&self) -> bool;

    /// Emit one formatted message.
    fn write(&self, message: &str);
}

/// A sink that is always disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    #[inline]
    fn enabled(&self) -> bool {
        false
    }

    fn write(&self, _message: &str) {}
}

/// A sink that forwards to the [`tracing`] crate at `TRACE` level.
///
/// Filter with e.g. `RUST_LOG=wbtree=trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    #[inline]
    fn enabled(&self) -> bool {
        tracing::enabled!(target: "wbtree", tracing::Level::TRACE)
    }

    fn write(&self, message: &str) {
        tracing::trace!(target: "wbtree", "{message}");
    }
}

/// A shareable, scoped handle on a [`TraceSink`].
///
/// Cloning is cheap (an `Arc` bump plus an optional shared prefix), which is
/// what lets spawned rebalances and delegated deletes carry their parent's
/// scope across task boundaries.
#[derive(Clone)]
pub struct Trace {
    sink: Arc<dyn TraceSink>,
    scope: Option<Arc<str>>,
}

impl Trace {
    /// Wrap a sink with no scope prefix.
    #[must_use]
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink, scope: None }
    }

    /// A trace that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoTrace))
    }

    /// Whether the underlying sink currently wants messages.
    #[must_use]
    #[inline]
    pub fn enabled(&self) -> bool {
        self.sink.enabled()
    }

    /// Log a lazily built message.
    ///
    /// The closure runs only when the sink is enabled.
    pub fn log<F>(&self, message: F)
    where
        F: FnOnce() -> String,
    {
        if self.sink.enabled() {
            match &self.scope {
                Some(scope) => self.sink.write(&format!("{scope} {}", message())),
                None => self.sink.write(&message()),
            }
        }
    }

    /// Derive a trace whose messages are prefixed with `id`.
    ///
    /// Prefixes chain: scoping an already scoped trace appends. When the sink
    /// is disabled the prefix is not even built, mirroring the lazy contract
    /// of [`Trace::log`].
    #[must_use]
    pub fn scoped(&self, id: &str) -> Self {
        if !self.sink.enabled() {
            return self.clone();
        }
        let scope: Arc<str> = match &self.scope {
            Some(scope) => Arc::from(format!("{scope} {id}")),
            None => Arc::from(id),
        };
        Self {
            sink: Arc::clone(&self.sink),
            scope: Some(scope),
        }
    }
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("enabled", &self.sink.enabled())
            .field("scope", &self.scope)
            .finish()
    }
}
