//! Request scope
//!
//! Tracks the first request an application dispatched and the one being
//! dispatched right now. Entering a scope swaps the current request and
//! hands back a guard; dropping the guard puts the previous one back, so
//! nested dispatch restores its caller on every exit path, `?` and panics
//! included.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use crate::request::Request;

#[derive(Debug, Default)]
pub struct RequestScope {
    initial: OnceCell<Rc<Request>>,
    current: RefCell<Option<Rc<Request>>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first request ever entered
    pub fn initial(&self) -> Option<Rc<Request>> {
        self.initial.get().cloned()
    }

    /// The innermost request being dispatched
    pub fn current(&self) -> Option<Rc<Request>> {
        self.current.borrow().clone()
    }

    /// Make `request` current until the returned guard is dropped
    ///
    /// The first request entered also becomes the initial request; later
    /// calls never replace it.
    pub fn enter(&self, request: Rc<Request>) -> ScopeGuard<'_> {
        let _ = self.initial.set(Rc::clone(&request));
        let previous = self.current.replace(Some(request));
        ScopeGuard {
            scope: self,
            previous,
        }
    }
}

/// Restores the previous current request on drop
#[must_use = "the request scope ends when the guard is dropped"]
pub struct ScopeGuard<'a> {
    scope: &'a RequestScope,
    previous: Option<Rc<Request>>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        *self.scope.current.borrow_mut() = self.previous.take();
    }
}
