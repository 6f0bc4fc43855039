//! Pluggable ratchet cipher interfaces.
//!
//! The double-ratchet, sealed-sender and sender-key primitives live in an
//! external library. This module defines the seams through which the envelope
//! cipher drives them:
//!
//! - [`SessionCipher`]: per-device session encrypt/decrypt
//! - [`SealedSessionCipher`]: sender-certificate wrapping of a session or
//!   group message that hides the sender
//! - [`GroupCipher`]: sender-key encryption keyed by a distribution id
//!
//! Every method receives the shared [`ProtocolStore`] explicitly. Callers hold
//! the [`SessionLock`](crate::SessionLock) for the full call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::ProtocolAddress;
use crate::store::ProtocolStore;
use crate::{CryptoError, Result};

/// Ciphertext type codes produced by the ratchet library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CiphertextType {
    /// Regular session message.
    Whisper = 2,
    /// Session message carrying a pre-key handshake.
    PreKey = 3,
    /// Sender-key group message.
    SenderKey = 7,
    /// Unencrypted control content.
    Plaintext = 8,
}

impl TryFrom<u8> for CiphertextType {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(Self::Whisper),
            3 => Ok(Self::PreKey),
            7 => Ok(Self::SenderKey),
            8 => Ok(Self::Plaintext),
            other => Err(CryptoError::InvalidMessage(format!(
                "unknown ciphertext type {other}"
            ))),
        }
    }
}

/// Output of a session or group encryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextMessage {
    message_type: CiphertextType,
    body: Vec<u8>,
}

impl CiphertextMessage {
    /// Wrap serialized ciphertext of the given type.
    pub fn new(message_type: CiphertextType, body: Vec<u8>) -> Self {
        Self { message_type, body }
    }

    /// Ciphertext type.
    pub fn message_type(&self) -> CiphertextType {
        self.message_type
    }

    /// Serialized ciphertext.
    pub fn serialize(&self) -> &[u8] {
        &self.body
    }

    /// Consume and return the serialized ciphertext.
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

/// Identifier of one sender-key distribution (one group send context).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionId([u8; 16]);

impl DistributionId {
    /// Size in bytes.
    pub const SIZE: usize = 16;

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the slice is not 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "distribution id must be {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DistributionId({})", hex::encode(self.0))
    }
}

/// Server-issued certificate binding a sender to its sealed-sender key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCertificate {
    sender: String,
    sender_device: u32,
    expires: u64,
    serialized: Vec<u8>,
}

impl SenderCertificate {
    /// Create a certificate for `sender` on `sender_device`.
    pub fn new(
        sender: impl Into<String>,
        sender_device: u32,
        expires: u64,
        serialized: Vec<u8>,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_device,
            expires,
            serialized,
        }
    }

    /// Certified sender identifier.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Certified sender device.
    pub fn sender_device(&self) -> u32 {
        self.sender_device
    }

    /// Expiry in milliseconds since the epoch.
    pub fn expires(&self) -> u64 {
        self.expires
    }

    /// Signed certificate bytes as issued by the server.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

/// Delivery capability for sealed-sender sends to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnidentifiedAccess {
    access_key: Vec<u8>,
    certificate: SenderCertificate,
}

impl UnidentifiedAccess {
    /// Bundle the recipient's access key with the local sender certificate.
    pub fn new(access_key: Vec<u8>, certificate: SenderCertificate) -> Self {
        Self {
            access_key,
            certificate,
        }
    }

    /// Access key presented to the server.
    pub fn access_key(&self) -> &[u8] {
        &self.access_key
    }

    /// Sender certificate embedded in the sealed envelope.
    pub fn certificate(&self) -> &SenderCertificate {
        &self.certificate
    }
}

/// How a receiver may treat undecryptable content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentHint {
    /// Show an error for undecryptable content.
    #[default]
    Default,
    /// Sender can resend; receiver may request it.
    Resendable,
    /// Nothing to show on failure.
    Implicit,
}

/// Inner message of a sealed-sender envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnidentifiedSenderContent {
    message: CiphertextMessage,
    sender_certificate: SenderCertificate,
    content_hint: ContentHint,
    group_id: Option<Vec<u8>>,
}

impl UnidentifiedSenderContent {
    /// Wrap `message` with sender metadata.
    pub fn new(
        message: CiphertextMessage,
        sender_certificate: SenderCertificate,
        content_hint: ContentHint,
        group_id: Option<Vec<u8>>,
    ) -> Self {
        Self {
            message,
            sender_certificate,
            content_hint,
            group_id,
        }
    }

    /// Wrapped ciphertext.
    pub fn message(&self) -> &CiphertextMessage {
        &self.message
    }

    /// Certificate of the true sender.
    pub fn sender_certificate(&self) -> &SenderCertificate {
        &self.sender_certificate
    }

    /// Content hint.
    pub fn content_hint(&self) -> ContentHint {
        self.content_hint
    }

    /// Group id for group sends.
    pub fn group_id(&self) -> Option<&[u8]> {
        self.group_id.as_deref()
    }
}

/// Result of opening a sealed-sender envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedDecryption {
    /// True sender, as certified.
    pub sender: ProtocolAddress,
    /// Type of the inner ciphertext.
    pub message_type: CiphertextType,
    /// Group id when the message was a group send.
    pub group_id: Option<Vec<u8>>,
    /// Decrypted, still transport-padded body.
    pub padded_message: Vec<u8>,
}

/// Per-device double-ratchet cipher.
pub trait SessionCipher: Send + Sync {
    /// Encrypt `padded` for `remote`, producing a whisper or pre-key message.
    fn encrypt(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        padded: &[u8],
    ) -> Result<CiphertextMessage>;

    /// Decrypt a pre-key message, establishing the session.
    fn decrypt_prekey(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypt a whisper message on an existing session.
    fn decrypt_whisper(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Sealed-sender cipher.
pub trait SealedSessionCipher: Send + Sync {
    /// Seal already session-encrypted `content` for `destination`.
    fn encrypt(
        &self,
        store: &dyn ProtocolStore,
        destination: &ProtocolAddress,
        content: &UnidentifiedSenderContent,
    ) -> Result<Vec<u8>>;

    /// Seal `content` once for every destination.
    fn multi_recipient_encrypt(
        &self,
        store: &dyn ProtocolStore,
        destinations: &[ProtocolAddress],
        content: &UnidentifiedSenderContent,
    ) -> Result<Vec<u8>>;

    /// Open a sealed envelope addressed to `local`.
    fn decrypt(
        &self,
        store: &dyn ProtocolStore,
        local: &ProtocolAddress,
        ciphertext: &[u8],
        server_timestamp: u64,
    ) -> Result<SealedDecryption>;
}

/// Sender-key group cipher.
pub trait GroupCipher: Send + Sync {
    /// Encrypt `padded` with the sender key of `sender` for `distribution_id`.
    fn encrypt(
        &self,
        store: &dyn ProtocolStore,
        sender: &ProtocolAddress,
        distribution_id: &DistributionId,
        padded: &[u8],
    ) -> Result<CiphertextMessage>;
}
