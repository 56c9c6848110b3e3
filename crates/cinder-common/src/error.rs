//! Error types for the Cinder particle engine.

use thiserror::Error;

/// Top-level error type for Cinder operations.
#[derive(Debug, Error)]
pub enum CinderError {
    /// Emitter or system configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Render/driver errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Configuration validation errors.
///
/// Raised when an emitter or system is built from an invalid config.
/// Runtime simulation paths never raise these; bad values degrade
/// silently per the engine's clamp-and-continue policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Emitter configured with zero particle capacity
    #[error("Emitter capacity must be non-zero")]
    ZeroCapacity,

    /// Emitter duration is not positive
    #[error("Emitter duration must be positive, got {0}")]
    NonPositiveDuration(f32),

    /// Warm-up tick parameters are inconsistent
    #[error("Warm-up requires a positive tick delta, got {0}")]
    InvalidWarmUp(f32),
}

/// Render-path errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The host renderer never bound the GPU buffer driver
    #[error("GPU buffer driver is not bound")]
    DriverNotBound,

    /// Buffer creation was rejected by the driver
    #[error("Buffer creation failed: {0}")]
    BufferCreate(String),
}

/// Result type alias for Cinder operations.
pub type CinderResult<T> = Result<T, CinderError>;
