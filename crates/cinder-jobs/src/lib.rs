//! # Cinder Jobs
//!
//! Fixed-pool job scheduler for the Cinder particle engine.
//!
//! This crate provides the concurrency substrate the simulation runs on:
//! - [`SpinLock`]: busy-wait lock for very short critical sections
//! - [`JobScheduler`]: explicitly constructed worker pool with per-worker
//!   queues, fire-and-forget jobs and data-parallel `fork` dispatch
//! - [`JobCounter`]: counter-based join primitive; the waiting thread
//!   helps drain queued work before spinning
//! - [`Scope`]: borrow-friendly fork over non-`'static` data, joined on
//!   scope exit, with [`DisjointSlice`] for index-disjoint mutation
//!
//! ## Architecture
//!
//! The scheduler owns `N` worker threads, each with its own job queue.
//! Submission round-robins across queues; an idle worker scans every
//! queue starting at its own before sleeping on a condvar. There is no
//! cross-queue stealing beyond that wrap-around scan.
//!
//! The scheduler is a plain object passed by reference into simulation
//! entry points. `shutdown()` (also run on drop) wakes and joins every
//! worker, so the pool tears down cleanly with the owning system.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod scheduler;
pub mod scope;
pub mod spin;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::scheduler::*;
    pub use crate::scope::*;
    pub use crate::spin::*;
}

pub use prelude::*;
