//! Error types for shardpack
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ShardError
pub type Result<T> = std::result::Result<T, ShardError>;

/// Unified error type for shardpack operations
#[derive(Debug, Error)]
pub enum ShardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Setup Errors (fatal before any work starts)
    // -------------------------------------------------------------------------
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Unsupported label schema: {0}")]
    UnsupportedSchema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    /// A single source item could not be turned into a record.
    /// The pipeline logs these and keeps going.
    #[error("Failed to process {}: {reason}", .path.display())]
    ItemProcessing { path: PathBuf, reason: String },

    /// Content payload failed codec validation
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// The store rejected a batch. The counter was not advanced.
    #[error("Commit failed: {0}")]
    CommitFailure(String),

    #[error("Shard is read-only")]
    ReadOnly,

    #[error("Shard is closed")]
    Closed,

    /// A run was stopped through its shutdown handle before the source drained.
    /// Records staged up to that point were still committed.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    // -------------------------------------------------------------------------
    // Read Errors
    // -------------------------------------------------------------------------
    #[error("Index {index} out of range for total length {length}")]
    IndexOutOfRange { index: i64, length: u64 },

    #[error("Record integrity error: {0}")]
    RecordIntegrity(String),

    #[error("Data log corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ShardError {
    /// Build an `ItemProcessing` error for a source path
    pub fn item(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ShardError::ItemProcessing {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
