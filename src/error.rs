//! Error types for strata.

use thiserror::Error;

/// Result type alias for strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Main error type for strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Block already exists")]
    BlockExists,

    #[error("Invalid block id '{id}'")]
    InvalidBlockId { id: String },

    #[error("Invalid partition key '{key}'")]
    InvalidPartitionKey { key: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Operation cancelled")]
    Cancelled,
}
