//! Error types for kiosk-core

use thiserror::Error;

/// Core error type for kiosk operations
///
/// Logical rejections (occupied locker, unknown code, ...) are not errors;
/// they are reported through `bool` / `Option` returns on the managers.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON or TOML decoding/encoding errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration value out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Dotted configuration key not in the schema
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid argument to an operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every code of the configured length is already held
    #[error("No unused prepaid code left for length {length}")]
    CodeSpaceExhausted {
        /// Configured code length
        length: usize,
    },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result type alias for kiosk-core operations
pub type Result<T> = std::result::Result<T, Error>;
