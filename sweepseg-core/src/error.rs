//! Error types for sweepseg

use thiserror::Error;

/// Main error type for sweepseg operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Insufficient samples: need at least {required}, found {found}")]
    InsufficientSamples { required: usize, found: usize },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

impl Error {
    /// Whether the error describes a local shortage of evidence (too few or
    /// degenerate points) rather than a frame-level failure.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::InsufficientSamples { .. } | Error::DegenerateGeometry(_)
        )
    }
}

/// Result type alias for sweepseg operations
pub type Result<T> = std::result::Result<T, Error>;
