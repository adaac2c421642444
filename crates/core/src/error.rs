//! Error types for the core curation engine

use thiserror::Error;

/// Core curation errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("run cancelled")]
    Cancelled,
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
