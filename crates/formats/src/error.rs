//! Error types for corpus I/O

use thiserror::Error;

/// Corpus I/O errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input at line {line}: {message}")]
    InvalidInput { line: usize, message: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for corpus I/O
pub type Result<T> = std::result::Result<T, Error>;
