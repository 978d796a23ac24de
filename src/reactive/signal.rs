//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and the
//! ordered set of computations that read it.
//!
//! # How Signals Work
//!
//! 1. Reading a signal inside a running computation registers that
//!    computation as a subscriber and the signal as one of its sources.
//!
//! 2. Writing a value equal to the current one does nothing.
//!
//! 3. Writing a different value notifies a snapshot of the subscribers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::computation::{ComputationId, Source, SourceId, Subscribers};

struct SignalInner<T> {
    id: SourceId,
    value: RefCell<T>,
    subscribers: Subscribers,
}

impl<T: 'static> Source for SignalInner<T> {
    fn unsubscribe(&self, computation: ComputationId) {
        self.subscribers.remove(computation);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Clones share the same cell.
///
/// ```rust
/// use tanni::reactive::{create_effect, Signal};
///
/// let count = Signal::new(1);
/// let reader = count.clone();
/// create_effect(move || println!("count = {}", reader.get()));
/// count.set(2);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SourceId::next(),
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
            }),
        }
    }

    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Borrow the current value, subscribing the current computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without subscribing.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of computations currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    fn track(&self) {
        let inner = &self.inner;
        inner.subscribers.track(inner.id, || {
            let source: Rc<dyn Source> = Rc::clone(inner) as Rc<dyn Source>;
            Rc::downgrade(&source)
        });
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Current value, subscribing the current computation.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Store `value` and notify subscribers if it differs from the current
    /// value.
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };

        if changed {
            self.inner.subscribers.notify();
        }
    }

    /// Derive the next value from the current one, then [`Signal::set`] it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Read half of [`create_signal`].
pub struct ReadSignal<T: 'static>(Signal<T>);

/// Write half of [`create_signal`].
pub struct WriteSignal<T: 'static>(Signal<T>);

impl<T: Clone + 'static> ReadSignal<T> {
    pub fn get(&self) -> T {
        self.0.get()
    }

    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }
}

impl<T: 'static> ReadSignal<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with(f)
    }
}

impl<T: PartialEq + 'static> WriteSignal<T> {
    pub fn set(&self, value: T) {
        self.0.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.0.update(f);
    }
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Create a signal and return its getter/setter pair.
pub fn create_signal<T: 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let signal = Signal::new(value);
    (ReadSignal(signal.clone()), WriteSignal(signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::create_effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let a = Signal::new(String::from("a"));
        let b = a.clone();
        a.set("b".to_string());
        assert_eq!(b.get(), "b");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn reads_outside_computation_do_not_subscribe() {
        let signal = Signal::new(1);
        let _ = signal.get();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let signal = Signal::new(3);
        let runs = Rc::new(Cell::new(0));

        let reader = signal.clone();
        let counter = Rc::clone(&runs);
        create_effect(move || {
            reader.get();
            counter.set(counter.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(3);
        assert_eq!(runs.get(), 1);
        signal.set(4);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn split_pair_shares_value() {
        let (count, set_count) = create_signal(0);
        set_count.set(1);
        set_count.update(|prev| prev + 1);
        assert_eq!(count.get(), 2);
    }
}
