//! # Cinder Core
//!
//! CPU particle simulation core.
//!
//! This crate provides the data-oriented particle pipeline:
//! - Generational config arena for module configuration
//! - The particle record and per-emitter live-range buffer
//! - Distribution abstraction (constant / random / curve values)
//! - The module set: emission rates, spawn shapes, per-tick forces and
//!   attribute updates, event generation
//! - Emitter orchestration (emit → spawn → update → event → recycle)
//! - System-level orchestration (LOD culling, play state, pre-warm)
//!
//! ## Architecture
//!
//! Every behavior is a small module parameterized by a config stored in
//! the arena and referenced by a checked handle; a stale handle skips the
//! module instead of faulting. Any numeric parameter can be a constant, a
//! random draw, or a curve sample via [`ValueSource`]. Parallelism is
//! *within* an emitter's particle batch (through `cinder-jobs`), never
//! across emitters in one system pass, so cross-emitter event and
//! inheritance traffic stays race-free.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod curve;
pub mod distribution;
pub mod emit_modules;
pub mod emitter;
pub mod event;
pub mod event_modules;
pub mod particle;
pub mod random_value;
pub mod spawn_modules;
pub mod system;
pub mod update_modules;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::*;
    pub use crate::curve::*;
    pub use crate::distribution::*;
    pub use crate::emit_modules::*;
    pub use crate::emitter::*;
    pub use crate::event::*;
    pub use crate::event_modules::*;
    pub use crate::particle::*;
    pub use crate::random_value::*;
    pub use crate::spawn_modules::*;
    pub use crate::system::*;
    pub use crate::update_modules::*;
}

pub use prelude::*;
