//! Opaque value handles.
//!
//! The tree never stores or compares values directly. Callers keep values in
//! their own storage and hand the tree a [`ValueHandle`] per stored value; all
//! ordering decisions go back through the
//! [`OperationManager`](crate::OperationManager) that owns the storage.
//!
//! A single handle value, [`ValueHandle::EMPTY`], is reserved as the sentinel
//! for "no value": it marks empty leaf nodes and is the handle reported by a
//! delete or by a search that found nothing.

use std::fmt;

/// Opaque handle into caller-owned value storage.
///
/// Handles are plain integers from the tree's point of view; only the
/// capability boundary can resolve or order them. The all-ones bit pattern is
/// reserved for [`ValueHandle::EMPTY`] and must not be produced by
/// [`OperationManager::store_value`](crate::OperationManager::store_value).
///
/// # Example
///
/// ```rust
/// use wbtree::ValueHandle;
///
/// let h = ValueHandle::new(7);
/// assert!(!h.is_empty());
/// assert_eq!(h.index(), 7);
/// assert!(ValueHandle::EMPTY.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueHandle(u64);

impl ValueHandle {
    /// The reserved "no value" sentinel.
    pub const EMPTY: Self = Self(u64::MAX);

    /// Wrap a storage index as a handle.
    ///
    /// # Panics
    ///
    /// Panics if `index` collides with the reserved sentinel.
    #[must_use]
    #[inline]
    pub fn new(index: u64) -> Self {
        assert!(
            index != u64::MAX,
            "value handle {index} collides with the empty sentinel"
        );
        Self(index)
    }

    /// The raw storage index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved sentinel.
    #[must_use]
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == u64::MAX
    }
}

impl fmt::Display for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("empty")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
