//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Protocol error while persisting or restoring a command.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ufsrv_protocol::ProtocolError),

    /// Key not found.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
