//! Error types for the filter pipeline

use thiserror::Error;

/// Filter pipeline errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("core error: {0}")]
    Core(#[from] rapidsift_core::Error),
}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, Error>;
