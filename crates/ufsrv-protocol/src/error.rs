//! Error types for command and envelope operations.

use thiserror::Error;
use ufsrv_crypto::CryptoError;

/// Errors that can occur while building, encoding or decrypting commands.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Command state is inconsistent (kind and payload disagree, or no
    /// payload). Only reachable through corrupt persisted snapshots.
    #[error("Inconsistent command state: {0}")]
    Build(String),

    /// A serialization step was requested before the command was finalized.
    #[error("Command not built: {stage} is not finalized")]
    NotBuilt {
        /// Which stage is missing ("sub-command" or "wire wrapper").
        stage: &'static str,
    },

    /// Malformed wire bytes.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Envelope violates its shape invariant.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Opaque snapshot serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Opaque snapshot was written by an unknown format version.
    #[error("Unsupported opaque format version: {0}")]
    UnsupportedVersion(u8),

    /// Input exceeds a protocol limit.
    #[error("{what} too large: {actual} bytes exceeds maximum {max}")]
    TooLarge {
        /// What was measured.
        what: &'static str,
        /// Actual size.
        actual: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// Encryption failed in a cipher backend.
    #[error("Encryption for {destination} failed: {source}")]
    Encrypt {
        /// Underlying cipher error.
        #[source]
        source: CryptoError,
        /// Destination address.
        destination: String,
    },

    /// Decryption failed; carries the nominal sender and device.
    #[error("Decryption of message from {sender}.{device} failed: {source}")]
    Decrypt {
        /// Underlying cipher error.
        #[source]
        source: CryptoError,
        /// Sender identifier as known at failure time.
        sender: String,
        /// Sender device.
        device: u32,
    },

    /// Store access failed outside a cipher call.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl ProtocolError {
    /// Underlying cipher error, for encrypt and decrypt failures.
    pub fn crypto_source(&self) -> Option<&CryptoError> {
        match self {
            Self::Encrypt { source, .. } | Self::Decrypt { source, .. } => Some(source),
            Self::Crypto(source) => Some(source),
            _ => None,
        }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
