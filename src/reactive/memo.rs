//! Memo Implementation
//!
//! A Memo is a derived value that is both a computation (it reads sources)
//! and a source (computations read it).
//!
//! Memos are eager: the value is computed on creation and recomputed when the
//! write that changed a dependency is flushed, ahead of any effect. Subscribers
//! are only notified when the recomputed value differs from the cached one.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::computation::{adopt, Computation, ComputationId, ComputationKind, Source, SourceId, Subscribers};

struct MemoInner<T> {
    id: SourceId,
    value: RefCell<Option<T>>,
    subscribers: Subscribers,
    computation: RefCell<Weak<Computation>>,
}

impl<T: 'static> Source for MemoInner<T> {
    fn unsubscribe(&self, computation: ComputationId) {
        self.subscribers.remove(computation);
    }

    fn height(&self) -> usize {
        self.computation
            .borrow()
            .upgrade()
            .map_or(0, |computation| computation.height())
    }
}

impl<T: PartialEq + 'static> MemoInner<T> {
    fn store(&self, next: T) {
        let changed = {
            let mut value = self.value.borrow_mut();
            if value.as_ref() == Some(&next) {
                false
            } else {
                *value = Some(next);
                true
            }
        };

        if changed {
            self.subscribers.notify();
        }
    }
}

/// A cached derived value.
///
/// # Type Parameters
///
/// - `T`: the computed value. `PartialEq` decides whether a recomputation
///   counts as a change.
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Borrow the cached value, subscribing the current computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let inner = &self.inner;
        inner.subscribers.track(inner.id, || {
            let source: Rc<dyn Source> = Rc::clone(inner) as Rc<dyn Source>;
            Rc::downgrade(&source)
        });
        self.with_untracked(f)
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(value) => f(value),
            // The constructor computes before returning, so this only
            // happens when a memo reads itself during its first run.
            None => panic!("memo read before its first computation finished"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T: Clone + 'static> Memo<T> {
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Create a memo and compute its initial value immediately.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    let inner = Rc::new(MemoInner {
        id: SourceId::next(),
        value: RefCell::new(None),
        subscribers: Subscribers::default(),
        computation: RefCell::new(Weak::new()),
    });

    let weak = Rc::downgrade(&inner);
    let computation = Computation::new(
        ComputationKind::Memo,
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                let next = compute();
                inner.store(next);
            }
        }),
    );
    *inner.computation.borrow_mut() = Rc::downgrade(&computation);
    adopt(&computation);
    computation.execute();

    Memo { inner }
}
