//! Computations and the subscriber/source bookkeeping shared by every
//! reactive primitive.
//!
//! Ownership runs one way: a source holds strong references to its
//! subscribers (that is what keeps an effect alive) while a computation only
//! holds weak references to the sources it read. Both sides are torn down
//! and rebuilt on every run of the computation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::runtime;

/// Unique identifier for a computation (effect or memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identifier for a source (signal or memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComputationKind {
    Effect,
    Memo,
}

/// Anything a computation can depend on.
pub(crate) trait Source {
    fn unsubscribe(&self, computation: ComputationId);

    /// Distance from the signals at the bottom of the graph. Signals are 0.
    fn height(&self) -> usize {
        0
    }
}

/// Ordered subscriber set owned by a source.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<IndexMap<ComputationId, Rc<Computation>>>,
}

impl Subscribers {
    /// Register the current computation (if any) as a subscriber and record
    /// the source as one of its dependencies.
    pub(crate) fn track(&self, id: SourceId, source: impl FnOnce() -> Weak<dyn Source>) {
        if let Some(current) = ReactiveContext::current() {
            if current.is_disposed() {
                return;
            }
            self.entries
                .borrow_mut()
                .insert(current.id(), Rc::clone(&current));
            current.add_source(id, source());
        }
    }

    /// Queue a snapshot of the current subscribers. Computations that
    /// subscribe while the notification is in progress are not visited.
    ///
    /// The write is its own batch, so outside an explicit [`runtime::batch`]
    /// the queue is drained before this returns.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<Rc<Computation>> = self.entries.borrow().values().cloned().collect();
        runtime::batch(|| {
            for computation in snapshot {
                runtime::enqueue(computation);
            }
        });
    }

    pub(crate) fn remove(&self, computation: ComputationId) {
        self.entries.borrow_mut().shift_remove(&computation);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// An effect or memo body together with its tracked sources and cleanups.
pub(crate) struct Computation {
    id: ComputationId,
    kind: ComputationKind,
    body: Rc<dyn Fn()>,
    sources: RefCell<IndexMap<SourceId, Weak<dyn Source>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    disposed: Cell<bool>,
    height: Cell<usize>,
}

impl Computation {
    pub(crate) fn new(kind: ComputationKind, body: Rc<dyn Fn()>) -> Rc<Self> {
        Rc::new(Self {
            id: ComputationId::next(),
            kind,
            body,
            sources: RefCell::new(IndexMap::new()),
            cleanups: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
            height: Cell::new(0),
        })
    }

    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }

    pub(crate) fn kind(&self) -> ComputationKind {
        self.kind
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// One more than the tallest source read during the last run.
    pub(crate) fn height(&self) -> usize {
        self.height.get()
    }

    pub(crate) fn add_source(&self, id: SourceId, source: Weak<dyn Source>) {
        if let Some(upstream) = source.upgrade() {
            self.height.set(self.height.get().max(upstream.height() + 1));
        }
        self.sources.borrow_mut().entry(id).or_insert(source);
    }

    pub(crate) fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    /// Run the body with this computation as the current one.
    pub(crate) fn execute(self: &Rc<Self>) {
        if self.is_disposed() {
            return;
        }
        self.reset();
        trace!(id = ?self.id, kind = ?self.kind, "executing computation");

        let _ctx = ReactiveContext::enter(Rc::clone(self));
        let body = Rc::clone(&self.body);
        body();
    }

    /// Tear down subscriptions and cleanups for good.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.reset();
    }

    /// Number of sources tracked during the last run.
    pub(crate) fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }

    fn reset(&self) {
        self.height.set(0);
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in sources.into_values() {
            if let Some(source) = source.upgrade() {
                source.unsubscribe(self.id);
            }
        }

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("sources", &self.source_count())
            .field("height", &self.height())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Tie a freshly created computation to the computation that created it, so
/// it is disposed when its owner re-runs.
pub(crate) fn adopt(child: &Rc<Computation>) {
    if let Some(owner) = ReactiveContext::current() {
        let child = Rc::downgrade(child);
        owner.add_cleanup(Box::new(move || {
            if let Some(child) = child.upgrade() {
                child.dispose();
            }
        }));
    }
}
