//! Error types for octwig

use thiserror::Error;

/// Main error type for the crate
///
/// Only I/O, configuration and device boundaries produce errors; structural
/// violations inside the octree and allocators are assertions.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("GPU error: {0}")]
    Gpu(String),
}
