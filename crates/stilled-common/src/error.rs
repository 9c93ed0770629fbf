//! Error types for The Stilled Hour.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum StilledError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Room geometry errors
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Room geometry errors.
#[derive(Debug, Error)]
pub enum BoundsError {
    /// An extent is zero, negative or not finite
    #[error("Invalid room extent {axis} = {value}")]
    InvalidExtent {
        /// Which extent
        axis: &'static str,
        /// Offending value
        value: f32,
    },
}

/// Result type alias for Stilled operations.
pub type StilledResult<T> = Result<T, StilledError>;
