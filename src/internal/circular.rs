//! Circular construction detection.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Classes currently being constructed within one top-level attempt.
///
/// Created fresh for every top-level construction and threaded through
/// the nested resolution calls by reference.
pub(crate) struct InProgress {
    stack: RefCell<Vec<Key>>,
    max_depth: usize,
}

impl InProgress {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            max_depth,
        }
    }

    /// Marks `class` as under construction until the guard drops.
    pub(crate) fn enter(&self, class: Key) -> DiResult<StackGuard<'_>> {
        let mut stack = self.stack.borrow_mut();

        // Circular detection before pushing the new class
        if stack.contains(&class) {
            let mut path: Vec<&'static str> = stack.iter().map(|k| k.short_name()).collect();
            path.push(class.short_name());
            return Err(DiError::ConstructorCycle(path));
        }

        if stack.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(stack.len()));
        }

        stack.push(class);
        Ok(StackGuard { owner: self, class })
    }

    pub(crate) fn contains(&self, class: &Key) -> bool {
        self.stack.borrow().contains(class)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

pub(crate) struct StackGuard<'a> {
    owner: &'a InProgress,
    class: Key,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        let mut stack = self.owner.stack.borrow_mut();
        if let Some(last) = stack.pop() {
            debug_assert_eq!(last, self.class);
        }
    }
}
