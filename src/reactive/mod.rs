//! Reactive Primitives
//!
//! This module implements the runtime half of Tanni: signals, memos and
//! effects with automatic dependency tracking and batched propagation. Code
//! emitted by [`crate::codegen`] drives these primitives to keep the DOM in
//! sync with component state.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] owns a value. Reading it inside a running computation
//! subscribes that computation; writing a different value notifies every
//! subscriber, either immediately or, inside a [`batch`], once the outermost
//! batch exits.
//!
//! ## Memos
//!
//! A [`Memo`] is both a computation and a source. It computes eagerly,
//! re-evaluates when a dependency changes and only notifies its own
//! subscribers when the new value differs from the previous one.
//!
//! ## Effects
//!
//! An effect is a computation without an output value. Each run starts by
//! unsubscribing from every previously tracked source and running the cleanup
//! callbacks registered with [`on_cleanup`] during the previous run.
//!
//! # Implementation Notes
//!
//! All scheduler state (current computation, batch depth, pending set,
//! microtask queue) is thread-local. The runtime is single-threaded by
//! construction: handles are `!Send`, so a multi-threaded host has to confine
//! a component tree to one thread.

mod computation;
mod context;
mod effect;
mod memo;
mod runtime;
mod signal;

pub use computation::{ComputationId, SourceId};
pub use context::is_tracking;
pub use effect::create_effect;
pub use memo::{create_memo, Memo};
pub use runtime::{
    batch, flush_microtasks, on_cleanup, on_mount, queue_microtask, untrack, ReactiveError,
};
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
