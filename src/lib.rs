//! Resumable, bounded-concurrency orchestrator for per-module worker runs.
//!
//! A run flattens the persisted module document into an ordered queue,
//! dispatches each item to an external worker process under a concurrency
//! bound, and records outcomes: successes into the document, failures into
//! the retry set. Interrupted or failed runs resume where they left off.
//!
//! `core` holds the pure domain model, `io` the side-effecting adapters, and
//! `scheduler`/`phases`/`driver` tie them together.

pub mod core;
pub mod document;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod phases;
pub mod scheduler;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
