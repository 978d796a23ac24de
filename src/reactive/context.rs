//! Reactive Context
//!
//! Tracks which computation is currently executing so that source reads can
//! be attributed to it. The pointer is thread-local and is only ever changed
//! through [`ReactiveContext`] guards, which restore the previous value when
//! dropped. That keeps nested computations correct and means a panicking
//! body cannot leave a stale pointer behind.

use std::cell::RefCell;
use std::rc::Rc;

use super::computation::Computation;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Computation>>> = const { RefCell::new(None) };
}

/// Guard that restores the previously current computation when dropped.
pub(crate) struct ReactiveContext {
    previous: Option<Rc<Computation>>,
}

impl ReactiveContext {
    /// Make `computation` the current computation until the guard drops.
    pub(crate) fn enter(computation: Rc<Computation>) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(computation)));
        Self { previous }
    }

    /// Clear the current computation until the guard drops.
    pub(crate) fn suspend() -> Self {
        let previous = CURRENT.with(|current| current.replace(None));
        Self { previous }
    }

    pub(crate) fn current() -> Option<Rc<Computation>> {
        CURRENT.with(|current| current.borrow().clone())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

/// Returns true while a computation is executing on this thread.
pub fn is_tracking() -> bool {
    CURRENT.with(|current| current.borrow().is_some())
}
