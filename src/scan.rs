//! Quiescent ordered traversal.
//!
//! [`first`] and [`next`] walk the tree in ascending order using the parent
//! back-pointers, one momentary field read at a time; they take no part in
//! the locking protocol and hold nothing across steps. They require the tree
//! to be quiescent (no in-flight operations): mid-mutation they can observe
//! a value twice or not at all, though never tear a read.
//!
//! [`Scan`] wraps the pair into an `Iterator` over value handles.

use std::sync::Arc;

use crate::handle::ValueHandle;
use crate::node::Node;

/// Descend to the leftmost value-bearing node under `node`, inclusive.
fn leftmost(mut node: Arc<Node>) -> Arc<Node> {
    loop {
        match node.peek_child(0) {
            Some(left) if !left.value().is_empty() => node = left,
            _ => return node,
        }
    }
}

/// The minimum node of the tree containing `node`, or `None` when empty.
///
/// Follows parent links to the root first, so any node of the tree works as
/// a starting point.
#[must_use]
pub fn first(node: &Arc<Node>) -> Option<Arc<Node>> {
    let mut root = Arc::clone(node);
    while let Some(parent) = root.parent() {
        root = parent;
    }
    if root.value().is_empty() {
        return None;
    }
    Some(leftmost(root))
}

/// The in-order successor of `node`, or `None` at the maximum.
#[must_use]
pub fn next(node: &Arc<Node>) -> Option<Arc<Node>> {
    if node.value().is_empty() {
        return None;
    }
    if let Some(right) = node.peek_child(1) {
        if !right.value().is_empty() {
            return Some(leftmost(right));
        }
    }
    // No right subtree: climb while we are our parent's right child; the
    // first ancestor we hang left of is the successor.
    let mut current = Arc::clone(node);
    loop {
        let parent = current.parent()?;
        let is_right_child = parent
            .peek_child(1)
            .is_some_and(|right| Arc::ptr_eq(&right, &current));
        if is_right_child {
            current = parent;
        } else {
            return Some(parent);
        }
    }
}

/// Ascending iterator over a quiescent tree's value handles.
#[derive(Debug)]
pub struct Scan {
    current: Option<Arc<Node>>,
}

impl Scan {
    pub(crate) fn new(root: &Arc<Node>) -> Self {
        Self {
            current: first(root),
        }
    }
}

impl Iterator for Scan {
    type Item = ValueHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current.take()?;
        let value = node.value();
        self.current = next(&node);
        Some(value)
    }
}
