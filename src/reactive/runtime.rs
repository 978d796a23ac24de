//! Reactive Runtime
//!
//! The scheduler that decides when a notified computation runs. Every write
//! parks its subscribers in the pending set and the set is drained once the
//! outermost batch exits. A write outside [`batch`] is a batch of its own, so
//! it still settles before returning.
//!
//! Draining runs pending memos before any pending effect, lowest height
//! first, so an effect only ever observes memos that have settled and runs
//! once no matter how many of its sources changed. Effects run in the order
//! they were queued.
//!
//! Draining keeps the batch engaged: writes made by drained computations
//! enqueue instead of running re-entrantly, and draining continues until
//! nothing is pending. A computation that keeps writing to its own
//! dependencies therefore never settles; bounding that is left to the
//! caller.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::trace;

use super::computation::{Computation, ComputationId, ComputationKind};
use super::context::ReactiveContext;

/// Errors raised by misuse of the reactive API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("on_cleanup must be called while an effect or memo is executing")]
    CleanupOutsideComputation,
}

#[derive(Default)]
struct RuntimeState {
    batch_depth: Cell<usize>,
    pending: RefCell<IndexMap<ComputationId, Rc<Computation>>>,
    microtasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

thread_local! {
    static RUNTIME: RuntimeState = RuntimeState::default();
}

/// Park `computation` until the outermost batch exits. A computation that is
/// already pending keeps its place.
pub(crate) fn enqueue(computation: Rc<Computation>) {
    RUNTIME.with(|rt| {
        rt.pending
            .borrow_mut()
            .entry(computation.id())
            .or_insert(computation);
    });
}

/// The lowest pending memo, or the oldest pending effect once no memo is left.
fn next_pending(pending: &mut IndexMap<ComputationId, Rc<Computation>>) -> Option<Rc<Computation>> {
    let memo = pending
        .values()
        .enumerate()
        .filter(|(_, computation)| computation.kind() == ComputationKind::Memo)
        .min_by_key(|&(index, computation)| (computation.height(), index))
        .map(|(index, _)| index);

    let index = match memo {
        Some(index) => index,
        None if pending.is_empty() => return None,
        None => 0,
    };
    pending.shift_remove_index(index).map(|(_, computation)| computation)
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = RUNTIME.with(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth
        });

        if depth == 0 {
            if std::thread::panicking() {
                RUNTIME.with(|rt| rt.pending.borrow_mut().clear());
            } else {
                flush_pending();
            }
        }
    }
}

/// Restores a zero batch depth once draining finishes or unwinds.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| {
            rt.batch_depth.set(0);
            if std::thread::panicking() {
                rt.pending.borrow_mut().clear();
            }
        });
    }
}

fn flush_pending() {
    RUNTIME.with(|rt| rt.batch_depth.set(1));
    let _drain = DrainGuard;

    let mut ran = 0usize;
    while let Some(computation) = RUNTIME.with(|rt| next_pending(&mut rt.pending.borrow_mut())) {
        computation.execute();
        ran += 1;
    }
    if ran > 0 {
        trace!(ran, "flushed pending computations");
    }
}

/// Defer propagation of every write made inside `f` until the outermost
/// batch exits. Each affected effect then runs once.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _guard = BatchGuard::enter();
    f()
}

/// Run `f` without attributing its reads to the enclosing computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::suspend();
    f()
}

/// Register `f` to run before the current computation's next run.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> Result<(), ReactiveError> {
    let current = ReactiveContext::current().ok_or(ReactiveError::CleanupOutsideComputation)?;
    current.add_cleanup(Box::new(f));
    Ok(())
}

/// Queue `f` to run on the next [`flush_microtasks`].
pub fn queue_microtask(f: impl FnOnce() + 'static) {
    RUNTIME.with(|rt| rt.microtasks.borrow_mut().push_back(Box::new(f)));
}

/// Run `f` after the synchronous setup phase, outside any tracking scope.
pub fn on_mount(f: impl FnOnce() + 'static) {
    queue_microtask(move || untrack(f));
}

/// Drain the microtask queue in FIFO order, including tasks queued while
/// draining. Returns the number of tasks run.
pub fn flush_microtasks() -> usize {
    let mut ran = 0;
    loop {
        let next = RUNTIME.with(|rt| rt.microtasks.borrow_mut().pop_front());
        match next {
            Some(task) => {
                task();
                ran += 1;
            }
            None => break,
        }
    }
    ran
}

#[cfg(test)]
pub(crate) fn batch_depth() -> usize {
    RUNTIME.with(|rt| rt.batch_depth.get())
}
