//! Error types for hatless-mdl.

use thiserror::Error;

/// Errors raised while working with compiled model files.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine-level decode/encode/patch failure.
    #[error("{0}")]
    Binary(#[from] hatless_binary::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;
