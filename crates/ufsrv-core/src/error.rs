//! Error types for the send and receive services.

use thiserror::Error;

/// Errors that can occur in the send and receive services.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Destination has no devices to send to.
    #[error("No devices for destination {0}")]
    NoDevices(String),

    /// Command kind has no server route.
    #[error("No server route for {0} commands")]
    NoRoute(String),

    /// A pipeline worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] ufsrv_crypto::CryptoError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ufsrv_protocol::ProtocolError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Store(#[from] ufsrv_store::StoreError),
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(error: tokio::task::JoinError) -> Self {
        CoreError::Worker(error.to_string())
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, CoreError>;
