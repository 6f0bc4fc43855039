//! Envelope cipher: strategy selection for outgoing and incoming envelopes.
//!
//! ## Encrypt
//!
//! | command e2ee | unidentified access | strategy | envelope type |
//! |---|---|---|---|
//! | true | yes | sealed sender | `UnidentifiedSender` (6) |
//! | true | no | session | `Ciphertext` (1) or `PrekeyBundle` (3) |
//! | false | - | bypass, base64 of the raw plaintext | `Unknown` (0) |
//!
//! ## Decrypt
//!
//! 1. Legacy slot: decrypted, unless an embedded command declares it is not
//!    end-to-end encrypted and [`DecryptPolicy::trust_sender_e2ee_flag`] is
//!    set, in which case the bytes are taken as plaintext.
//! 2. Content slot: always decrypted.
//! 3. Native push: the embedded command's wire bytes are the plaintext.
//!
//! Every result is normalized into [`Plaintext`], whatever the path.
//!
//! ## Locking
//!
//! Session, sealed-sender and group operations hold the shared
//! [`SessionLock`] for the whole call. Bypass and native-push paths never
//! take it.

mod decrypt;
mod encrypt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ufsrv_crypto::{
    CryptoError, GroupCipher, ProtocolAddress, ProtocolStore, SealedSessionCipher, SessionCipher,
    SessionLock,
};

use crate::ProtocolError;
use crate::envelope::WireEnvelope;

/// Receive-side policy knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptPolicy {
    /// Honour an embedded command's "not end-to-end encrypted" declaration
    /// on legacy-slot envelopes.
    pub trust_sender_e2ee_flag: bool,
}

impl Default for DecryptPolicy {
    fn default() -> Self {
        Self {
            trust_sender_e2ee_flag: true,
        }
    }
}

/// How a received envelope was turned into plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptPath {
    /// A cipher (or plaintext-content extraction) ran.
    Decrypted,
    /// The legacy slot was taken as plaintext.
    Bypassed,
    /// The embedded command was the payload.
    NativePush,
}

/// Normalized description of a received envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Sender identifier (the certified sender for sealed envelopes).
    pub sender: String,
    /// Sender device.
    pub sender_device: u32,
    /// Client timestamp in milliseconds.
    pub timestamp: u64,
    /// Server receive timestamp in milliseconds.
    pub server_received_timestamp: u64,
    /// Server delivery timestamp in milliseconds.
    pub server_delivered_timestamp: u64,
    /// Whether a delivery receipt should be sent.
    pub needs_receipt: bool,
    /// Server-assigned guid.
    pub server_guid: Option<String>,
    /// Group id, for sealed group sends.
    pub group_id: Option<Vec<u8>>,
    /// Path taken.
    pub path: DecryptPath,
}

impl EnvelopeMetadata {
    fn from_envelope(envelope: &WireEnvelope, path: DecryptPath, needs_receipt: bool) -> Self {
        Self {
            sender: envelope.source().identifier().unwrap_or_default().to_string(),
            sender_device: envelope.source_device(),
            timestamp: envelope.timestamp(),
            server_received_timestamp: envelope.server_timestamp(),
            server_delivered_timestamp: envelope.server_delivered_timestamp(),
            needs_receipt,
            server_guid: envelope.server_guid().map(str::to_string),
            group_id: None,
            path,
        }
    }
}

/// Decrypted body and its metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plaintext {
    /// Normalized metadata.
    pub metadata: EnvelopeMetadata,
    /// Unpadded plaintext.
    pub data: Vec<u8>,
}

/// Pluggable ratchet backends.
#[derive(Clone)]
pub struct CipherBackends {
    /// Per-device session cipher.
    pub session: Arc<dyn SessionCipher>,
    /// Sealed-sender cipher.
    pub sealed: Arc<dyn SealedSessionCipher>,
    /// Sender-key group cipher.
    pub group: Arc<dyn GroupCipher>,
}

/// Selects and runs encrypt/decrypt strategies for one local account.
pub struct EnvelopeCipher {
    store: Arc<dyn ProtocolStore>,
    lock: Arc<SessionLock>,
    backends: CipherBackends,
    local: ProtocolAddress,
    policy: DecryptPolicy,
}

impl EnvelopeCipher {
    /// Create a cipher for `local`, sharing `lock` with every other cipher
    /// over the same store.
    pub fn new(
        store: Arc<dyn ProtocolStore>,
        lock: Arc<SessionLock>,
        backends: CipherBackends,
        local: ProtocolAddress,
    ) -> Self {
        Self {
            store,
            lock,
            backends,
            local,
            policy: DecryptPolicy::default(),
        }
    }

    /// Replace the receive policy.
    pub fn with_policy(mut self, policy: DecryptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Local address.
    pub fn local_address(&self) -> &ProtocolAddress {
        &self.local
    }

    /// Receive policy.
    pub fn policy(&self) -> DecryptPolicy {
        self.policy
    }
}

fn decrypt_error(envelope: &WireEnvelope, source: CryptoError) -> ProtocolError {
    ProtocolError::Decrypt {
        source,
        sender: envelope
            .source()
            .identifier()
            .unwrap_or("unknown")
            .to_string(),
        device: envelope.source_device(),
    }
}
