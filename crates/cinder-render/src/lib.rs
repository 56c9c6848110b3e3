//! # Cinder Render
//!
//! CPU-side render preparation for the Cinder particle engine.
//!
//! This crate turns post-update particle buffers into GPU-ready data:
//! - A narrow GPU buffer driver interface (function-pointer slots for
//!   create / update / destroy) so the host renderer stays in charge of
//!   actual GPU objects
//! - Pod vertex layouts for the three render variants
//! - Packers that read a particle slice and emit vertex/index arrays
//!   plus a [`DrawItem`] describing how to draw them
//!
//! The engine never talks to a graphics API directly. Billboard
//! expansion and ribbon side extrusion happen in the host's shaders; the
//! packers only provide per-vertex centers, corners and widths.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod draw;
pub mod gpu;
pub mod mesh;
pub mod ribbon;
pub mod sprite;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::draw::*;
    pub use crate::gpu::*;
    pub use crate::mesh::*;
    pub use crate::ribbon::*;
    pub use crate::sprite::*;
}

pub use prelude::*;
