//! Bridges NM's single-threaded, cooperative D-Bus object API to the
//! parallel-threaded orchestrator that drives per-region refreshes
//! (spec.md 4.7, C7).
//!
//! Owns exactly one background event-loop thread, started lazily at first
//! use. Every NM call must be issued from that thread and every completion
//! delivered there; [`Runtime::submit`] schedules work onto it and returns
//! a [`CompletionHandle`] resolvable from any thread. [`LazyOnLoop`] builds
//! the one process-wide resource (the NM client) that must itself be
//! constructed on the loop.

mod error;
mod handle;
mod lazy;
mod loop_thread;
mod runtime;

pub use error::RuntimeError;
pub use handle::CompletionHandle;
pub use lazy::LazyOnLoop;
pub use runtime::{on_loop_thread, Runtime};
