//! Error types for the session-cipher boundary.

use thiserror::Error;

/// Errors raised by the ratchet backends and the protocol store.
///
/// Each variant corresponds to one failure family of the pluggable cipher
/// library. Callers pick a recovery strategy through [`CryptoError::recovery`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The message was already decrypted once (replay).
    #[error("Duplicate message: {0}")]
    DuplicateMessage(String),

    /// The remote identity key does not match the trusted one.
    #[error("Untrusted identity for {0}")]
    UntrustedIdentity(String),

    /// A key could not be parsed or used.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A referenced pre-key or signed pre-key id is unknown.
    #[error("Invalid key id: {0}")]
    InvalidKeyId(String),

    /// The ciphertext declares an unsupported protocol version.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// The message uses a retired protocol version.
    #[error("Legacy message: {0}")]
    LegacyMessage(String),

    /// No session exists for the remote address.
    #[error("No session for {0}")]
    NoSession(String),

    /// The ciphertext failed to authenticate or parse.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The envelope shape does not allow decryption.
    #[error("Invalid message structure: {0}")]
    InvalidMessageStructure(String),

    /// A sealed-sender message was sent by the local account.
    #[error("Message was sent by the local account")]
    SelfSend,

    /// Sealed-sender metadata could not be validated.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Store backend failure.
    #[error("Store error: {0}")]
    Store(String),
}

/// Recovery action a receiver should take for a failed decryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Drop the message without telling the user (replays).
    DropSilently,
    /// Ask the user to verify the sender's identity.
    VerifyIdentity,
    /// Re-establish the session with the sender, then retry.
    ReestablishSession,
    /// Surface the failure and drop the message.
    SurfaceAndDrop,
}

impl CryptoError {
    /// Map this error to the recovery action expected from the caller.
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::DuplicateMessage(_) => Recovery::DropSilently,
            Self::UntrustedIdentity(_) => Recovery::VerifyIdentity,
            Self::NoSession(_) => Recovery::ReestablishSession,
            _ => Recovery::SurfaceAndDrop,
        }
    }

    /// Whether the operation may succeed once the session is repaired.
    pub fn is_retryable(&self) -> bool {
        self.recovery() == Recovery::ReestablishSession
    }
}

/// Result type for cipher and store operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_mapping() {
        assert_eq!(
            CryptoError::DuplicateMessage("x".into()).recovery(),
            Recovery::DropSilently
        );
        assert_eq!(
            CryptoError::UntrustedIdentity("x".into()).recovery(),
            Recovery::VerifyIdentity
        );
        assert_eq!(
            CryptoError::NoSession("x".into()).recovery(),
            Recovery::ReestablishSession
        );
        assert_eq!(CryptoError::SelfSend.recovery(), Recovery::SurfaceAndDrop);
        assert_eq!(
            CryptoError::InvalidKeyId("7".into()).recovery(),
            Recovery::SurfaceAndDrop
        );
    }

    #[test]
    fn test_only_missing_session_is_retryable() {
        assert!(CryptoError::NoSession("alice".into()).is_retryable());
        assert!(!CryptoError::InvalidMessage("bad mac".into()).is_retryable());
        assert!(!CryptoError::LegacyMessage("v2".into()).is_retryable());
    }
}
