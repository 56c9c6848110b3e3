//! # Cinder Common
//!
//! Common types, utilities, and shared abstractions for the Cinder
//! particle engine.
//!
//! This crate provides foundational types used across all Cinder
//! subsystems:
//! - Seedable random streams for deterministic particle sampling
//! - Transform type (translation / rotation / scale)
//! - Curl-noise vector field for turbulence forces
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod curl;
pub mod error;
pub mod random;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::curl::*;
    pub use crate::error::*;
    pub use crate::random::*;
    pub use crate::transform::*;
}

pub use prelude::*;
