//! Loopback cipher backends for tests and local tooling.
//!
//! These backends keep the shapes and side effects of the real ratchet
//! library (session creation on first contact, pre-key versus whisper
//! selection, sealed sender carrying the true sender) while replacing the
//! cryptography with a reversible byte mask. They are NOT secure.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::address::ProtocolAddress;
use crate::cipher::{
    CiphertextMessage, CiphertextType, DistributionId, GroupCipher, SealedDecryption,
    SealedSessionCipher, SessionCipher, UnidentifiedSenderContent,
};
use crate::store::{CURRENT_SESSION_VERSION, ProtocolStore, SessionRecord};
use crate::{CryptoError, Result};

/// Registration id recorded for every loopback session.
pub const LOOPBACK_REGISTRATION_ID: u32 = 4711;

const MASK: u8 = 0x5a;

fn mask(data: &[u8]) -> Vec<u8> {
    data.iter().map(|b| b ^ MASK).collect()
}

/// Session cipher that masks bytes and tracks calls.
#[derive(Debug, Default)]
pub struct LoopbackSessionCipher {
    calls: AtomicUsize,
    failure: Mutex<Option<CryptoError>>,
}

impl LoopbackSessionCipher {
    /// Create a cipher with no injected failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: CryptoError) {
        *self.failure.lock() = Some(error);
    }

    /// Number of encrypt or decrypt calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl SessionCipher for LoopbackSessionCipher {
    fn encrypt(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        padded: &[u8],
    ) -> Result<CiphertextMessage> {
        self.enter()?;
        let message_type = if store.contains_session(remote)? {
            CiphertextType::Whisper
        } else {
            store.store_session(remote, loopback_session())?;
            CiphertextType::PreKey
        };
        Ok(CiphertextMessage::new(message_type, mask(padded)))
    }

    fn decrypt_prekey(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        self.enter()?;
        if !store.contains_session(remote)? {
            store.store_session(remote, loopback_session())?;
        }
        Ok(mask(ciphertext))
    }

    fn decrypt_whisper(
        &self,
        store: &dyn ProtocolStore,
        remote: &ProtocolAddress,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        self.enter()?;
        if !store.contains_session(remote)? {
            return Err(CryptoError::NoSession(remote.to_string()));
        }
        Ok(mask(ciphertext))
    }
}

fn loopback_session() -> SessionRecord {
    SessionRecord::new(CURRENT_SESSION_VERSION, LOOPBACK_REGISTRATION_ID, Vec::new())
}

#[derive(Serialize, Deserialize)]
struct SealedFrame {
    sender: String,
    sender_device: u32,
    message_type: u8,
    group_id: Option<Vec<u8>>,
    body: Vec<u8>,
}

impl SealedFrame {
    fn of(content: &UnidentifiedSenderContent) -> Self {
        let certificate = content.sender_certificate();
        Self {
            sender: certificate.sender().to_string(),
            sender_device: certificate.sender_device(),
            message_type: content.message().message_type() as u8,
            group_id: content.group_id().map(<[u8]>::to_vec),
            body: content.message().serialize().to_vec(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MultiRecipientFrame {
    recipients: Vec<ProtocolAddress>,
    frame: SealedFrame,
}

/// Sealed-sender cipher that frames the true sender next to the masked body.
///
/// Opening a frame unmasks the inner session message with a private
/// session cipher, the way the real sealed cipher decrypts its payload.
#[derive(Debug, Default)]
pub struct LoopbackSealedCipher {
    inner: LoopbackSessionCipher,
    calls: AtomicUsize,
    multi_recipient_calls: AtomicUsize,
}

impl LoopbackSealedCipher {
    /// Create a sealed cipher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of encrypt or decrypt calls made so far, including
    /// multi-recipient sends.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst) + self.multi_recipient_calls()
    }

    /// Number of multi-recipient sends.
    pub fn multi_recipient_calls(&self) -> usize {
        self.multi_recipient_calls.load(Ordering::SeqCst)
    }

    /// Recipients listed in a multi-recipient ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidMessage`] if the frame does not parse.
    pub fn recipients_of(ciphertext: &[u8]) -> Result<Vec<ProtocolAddress>> {
        let frame: MultiRecipientFrame = bincode::deserialize(ciphertext)
            .map_err(|e| CryptoError::InvalidMessage(e.to_string()))?;
        Ok(frame.recipients)
    }
}

impl SealedSessionCipher for LoopbackSealedCipher {
    fn encrypt(
        &self,
        _store: &dyn ProtocolStore,
        _destination: &ProtocolAddress,
        content: &UnidentifiedSenderContent,
    ) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bincode::serialize(&SealedFrame::of(content))
            .map_err(|e| CryptoError::InvalidMessage(e.to_string()))
    }

    fn multi_recipient_encrypt(
        &self,
        _store: &dyn ProtocolStore,
        destinations: &[ProtocolAddress],
        content: &UnidentifiedSenderContent,
    ) -> Result<Vec<u8>> {
        self.multi_recipient_calls.fetch_add(1, Ordering::SeqCst);
        let frame = MultiRecipientFrame {
            recipients: destinations.to_vec(),
            frame: SealedFrame::of(content),
        };
        bincode::serialize(&frame).map_err(|e| CryptoError::InvalidMessage(e.to_string()))
    }

    fn decrypt(
        &self,
        store: &dyn ProtocolStore,
        local: &ProtocolAddress,
        ciphertext: &[u8],
        _server_timestamp: u64,
    ) -> Result<SealedDecryption> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let frame: SealedFrame = bincode::deserialize(ciphertext)
            .map_err(|e| CryptoError::InvalidMetadata(e.to_string()))?;

        if frame.sender == local.name() && frame.sender_device == local.device_id() {
            return Err(CryptoError::SelfSend);
        }

        let sender = ProtocolAddress::new(frame.sender, frame.sender_device);
        let message_type = CiphertextType::try_from(frame.message_type)?;
        let padded_message = match message_type {
            CiphertextType::PreKey => self.inner.decrypt_prekey(store, &sender, &frame.body)?,
            CiphertextType::Whisper => self.inner.decrypt_whisper(store, &sender, &frame.body)?,
            CiphertextType::SenderKey => mask(&frame.body),
            CiphertextType::Plaintext => frame.body,
        };

        Ok(SealedDecryption {
            sender,
            message_type,
            group_id: frame.group_id,
            padded_message,
        })
    }
}

/// Group cipher that masks bytes under a sender key.
#[derive(Debug, Default)]
pub struct LoopbackGroupCipher {
    calls: AtomicUsize,
}

impl LoopbackGroupCipher {
    /// Create a group cipher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of encryptions performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GroupCipher for LoopbackGroupCipher {
    fn encrypt(
        &self,
        _store: &dyn ProtocolStore,
        _sender: &ProtocolAddress,
        _distribution_id: &DistributionId,
        padded: &[u8],
    ) -> Result<CiphertextMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CiphertextMessage::new(CiphertextType::SenderKey, mask(padded)))
    }
}

/// Seal `body` as if `sender` had encrypted it with the given inner type.
///
/// Lets receive-path tests build unidentified-sender envelopes without a
/// full send.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidMessage`] if framing fails.
pub fn seal_for_test(
    sender: &ProtocolAddress,
    message_type: CiphertextType,
    group_id: Option<Vec<u8>>,
    padded: &[u8],
) -> Result<Vec<u8>> {
    let body = match message_type {
        CiphertextType::Plaintext => padded.to_vec(),
        _ => mask(padded),
    };
    let frame = SealedFrame {
        sender: sender.name().to_string(),
        sender_device: sender.device_id(),
        message_type: message_type as u8,
        group_id,
        body,
    };
    bincode::serialize(&frame).map_err(|e| CryptoError::InvalidMessage(e.to_string()))
}

/// Session ciphertext for `padded`, as the loopback session cipher would
/// produce it.
pub fn session_ciphertext_for_test(padded: &[u8]) -> Vec<u8> {
    mask(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{ContentHint, SenderCertificate};
    use crate::store::MemoryProtocolStore;

    #[test]
    fn test_first_encrypt_is_prekey() {
        let store = MemoryProtocolStore::new();
        let cipher = LoopbackSessionCipher::new();
        let bob = ProtocolAddress::new("bob", 1);

        let first = cipher.encrypt(&store, &bob, b"hi").unwrap();
        let second = cipher.encrypt(&store, &bob, b"hi").unwrap();

        assert_eq!(first.message_type(), CiphertextType::PreKey);
        assert_eq!(second.message_type(), CiphertextType::Whisper);
        assert_eq!(cipher.calls(), 2);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let store = MemoryProtocolStore::new();
        let cipher = LoopbackSessionCipher::new();
        let bob = ProtocolAddress::new("bob", 1);
        cipher.fail_next(CryptoError::NoSession("bob.1".into()));

        assert!(cipher.encrypt(&store, &bob, b"x").is_err());
        assert!(cipher.encrypt(&store, &bob, b"x").is_ok());
    }

    #[test]
    fn test_sealed_roundtrip_reveals_sender() {
        let alice_store = MemoryProtocolStore::new();
        let bob_store = MemoryProtocolStore::new();
        let session = LoopbackSessionCipher::new();
        let cipher = LoopbackSealedCipher::new();
        let alice_cert = SenderCertificate::new("alice", 2, u64::MAX, vec![]);
        let bob = ProtocolAddress::new("bob", 1);

        let inner = session.encrypt(&alice_store, &bob, b"secret").unwrap();
        let content =
            UnidentifiedSenderContent::new(inner, alice_cert, ContentHint::Default, None);
        let sealed = cipher.encrypt(&alice_store, &bob, &content).unwrap();
        let opened = cipher.decrypt(&bob_store, &bob, &sealed, 0).unwrap();

        assert_eq!(opened.sender, ProtocolAddress::new("alice", 2));
        assert_eq!(opened.message_type, CiphertextType::PreKey);
        assert_eq!(opened.padded_message, b"secret");
        assert_eq!(session.calls(), 1);
        assert_eq!(cipher.calls(), 2);
    }

    #[test]
    fn test_sealed_self_send_rejected() {
        let store = MemoryProtocolStore::new();
        let cipher = LoopbackSealedCipher::new();
        let me = ProtocolAddress::new("me", 1);
        let sealed = seal_for_test(&me, CiphertextType::Plaintext, None, b"x").unwrap();

        let result = cipher.decrypt(&store, &me, &sealed, 0);
        assert_eq!(result.unwrap_err(), CryptoError::SelfSend);
    }
}
