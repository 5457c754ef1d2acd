//! Dynamic admission control for bounding concurrent task execution
//!
//! This crate provides the [`Gate`], an in-process synchronization primitive
//! that bounds how many submitted tasks may run at once. The limit can be
//! raised or lowered at runtime, and callers can block until every in-flight
//! task has finished.
//!
//! It is a building block for job dispatchers and connection throttlers, not a
//! work queue: there is no buffering, no prioritization, and no cancellation.
//! A caller that cannot be admitted blocks until a slot frees up.
//!
//! # Example
//!
//! ```rust
//! use workgate::Gate;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let gate = Gate::with_limit(4);
//! let done = Arc::new(AtomicUsize::new(0));
//!
//! // At most 4 of these run concurrently; submit() blocks once the
//! // gate is full and returns as soon as the task is admitted.
//! for _ in 0..16 {
//!     let done = done.clone();
//!     gate.submit(move || {
//!         done.fetch_add(1, Ordering::Relaxed);
//!     });
//! }
//!
//! // Block until every admitted task has finished.
//! gate.drain();
//! assert_eq!(done.load(Ordering::Relaxed), 16);
//! ```

mod gate;

pub use gate::{Gate, GatePermit};
