//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Visiting stack for one top-level resolution.
///
/// Each call to `Scope::resolve_any` starts a fresh path; factories resolve
/// their dependencies through a context that shares it, so a key seen twice
/// on the same path is a cycle.
pub(crate) struct ResolutionPath {
    stack: RefCell<SmallVec<[Key; 8]>>,
    max_depth: usize,
}

impl ResolutionPath {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            stack: RefCell::new(SmallVec::new()),
            max_depth,
        }
    }

    /// Pushes `key`, failing if it is already being resolved on this path.
    pub(crate) fn enter(&self, key: Key) -> DiResult<PathGuard<'_>> {
        let mut stack = self.stack.borrow_mut();

        // Circular detection BEFORE pushing the new key
        if stack.iter().any(|k| *k == key) {
            let mut path: Vec<&'static str> = stack.iter().map(Key::display_name).collect();
            path.push(key.display_name());
            return Err(DiError::Circular(path));
        }

        if stack.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(stack.len()));
        }

        stack.push(key);
        Ok(PathGuard { path: self })
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Pops the entered key when dropped.
pub(crate) struct PathGuard<'a> {
    path: &'a ResolutionPath,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.path.stack.borrow_mut().pop();
    }
}
