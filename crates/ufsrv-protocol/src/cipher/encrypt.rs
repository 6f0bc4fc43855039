use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;
use ufsrv_crypto::{
    CiphertextType, ContentHint, CryptoError, DistributionId, ProtocolAddress, SenderCertificate,
    UnidentifiedAccess, UnidentifiedSenderContent,
};

use super::EnvelopeCipher;
use crate::command::Command;
use crate::outgoing::{OutgoingPushMessage, UNENCRYPTED_MESSAGE_TYPE};
use crate::transport::pad_message_body;
use crate::wire::EnvelopeType;
use crate::{ProtocolError, Result};

impl EnvelopeCipher {
    /// Encrypt `plaintext` for one destination device.
    ///
    /// The padded plaintext is always session-encrypted first; with
    /// unidentified access the session message is then sealed under the
    /// sender certificate. Commands with end-to-end encryption switched off
    /// bypass the cipher: the body is the base64 of the raw plaintext and the
    /// type is the unencrypted sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encrypt`] when a cipher or store call fails.
    pub fn encrypt(
        &self,
        destination: &ProtocolAddress,
        unidentified_access: Option<&UnidentifiedAccess>,
        plaintext: &[u8],
        command: &Command,
    ) -> Result<OutgoingPushMessage> {
        if !command.is_e2ee() {
            debug!(
                kind = %command.kind(),
                destination = %destination,
                "Bypassing end-to-end encryption"
            );
            return Ok(OutgoingPushMessage {
                message_type: UNENCRYPTED_MESSAGE_TYPE,
                destination_device_id: destination.device_id(),
                destination_registration_id: 0,
                content: BASE64.encode(plaintext),
            });
        }

        let encrypt_error = |source: CryptoError| ProtocolError::Encrypt {
            source,
            destination: destination.to_string(),
        };

        let _guard = self.lock.acquire();
        let padded = pad_message_body(plaintext);
        let store = self.store.as_ref();

        let message = self
            .backends
            .session
            .encrypt(store, destination, &padded)
            .map_err(encrypt_error)?;

        let (message_type, body) = match unidentified_access {
            Some(access) => {
                debug!(destination = %destination, "Sealing session message");
                let content = UnidentifiedSenderContent::new(
                    message,
                    access.certificate().clone(),
                    ContentHint::Default,
                    None,
                );
                let body = self
                    .backends
                    .sealed
                    .encrypt(store, destination, &content)
                    .map_err(encrypt_error)?;
                (EnvelopeType::UnidentifiedSender, body)
            }
            None => {
                let message_type = match message.message_type() {
                    CiphertextType::PreKey => EnvelopeType::PrekeyBundle,
                    CiphertextType::Whisper => EnvelopeType::Ciphertext,
                    CiphertextType::Plaintext => EnvelopeType::PlaintextContent,
                    CiphertextType::SenderKey => {
                        return Err(encrypt_error(CryptoError::InvalidMessage(
                            "session cipher produced a sender-key message".into(),
                        )));
                    }
                };
                debug!(destination = %destination, ?message_type, "Encrypted with session");
                (message_type, message.into_bytes())
            }
        };

        let registration_id = store
            .remote_registration_id(destination)
            .map_err(encrypt_error)?;

        Ok(OutgoingPushMessage {
            message_type: message_type as u32,
            destination_device_id: destination.device_id(),
            destination_registration_id: registration_id,
            content: BASE64.encode(body),
        })
    }

    /// Encrypt once for a whole group with the sender key of
    /// `distribution_id`, then seal the result for every destination.
    ///
    /// Returns the multi-recipient ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encrypt`] when a cipher call fails.
    pub fn encrypt_for_group(
        &self,
        distribution_id: &DistributionId,
        destinations: &[ProtocolAddress],
        sender_certificate: &SenderCertificate,
        plaintext: &[u8],
        content_hint: ContentHint,
        group_id: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let encrypt_error = |source: CryptoError| ProtocolError::Encrypt {
            source,
            destination: format!("group {distribution_id:?}"),
        };

        let _guard = self.lock.acquire();
        let padded = pad_message_body(plaintext);
        let store = self.store.as_ref();

        let message = self
            .backends
            .group
            .encrypt(store, &self.local, distribution_id, &padded)
            .map_err(encrypt_error)?;
        let content = UnidentifiedSenderContent::new(
            message,
            sender_certificate.clone(),
            content_hint,
            group_id,
        );

        debug!(
            recipients = destinations.len(),
            distribution_id = ?distribution_id,
            "Sealing group message"
        );
        self.backends
            .sealed
            .multi_recipient_encrypt(store, destinations, &content)
            .map_err(encrypt_error)
    }
}

#[cfg(test)]
mod tests {
    use ufsrv_crypto::testing::{LOOPBACK_REGISTRATION_ID, LoopbackSealedCipher};
    use ufsrv_crypto::store::CURRENT_SESSION_VERSION;
    use ufsrv_crypto::{MemoryProtocolStore, ProtocolStore, SealedSessionCipher, SessionRecord};

    use super::*;
    use crate::cipher::test_support::Harness;
    use crate::transport::strip_message_padding;
    use crate::wire::{MessageCommand, StateCommand};

    fn sealed_command(e2ee: bool) -> Command {
        let mut command = Command::from_built(MessageCommand::default()).with_e2ee(e2ee);
        command.finalize();
        command
    }

    fn bob() -> ProtocolAddress {
        ProtocolAddress::new("bob", 2)
    }

    #[test]
    fn test_bypass_skips_cipher() {
        let harness = Harness::new();
        let command = sealed_command(false);
        let plaintext = command.to_bytes().unwrap();

        let message = harness
            .cipher
            .encrypt(&bob(), None, &plaintext, &command)
            .unwrap();

        assert_eq!(harness.cipher_calls(), 0);
        assert!(message.is_unencrypted());
        assert_eq!(message.destination_device_id, 2);
        assert_eq!(message.destination_registration_id, 0);
        assert_eq!(BASE64.decode(&message.content).unwrap(), plaintext);
    }

    #[test]
    fn test_bypass_does_not_take_lock() {
        let harness = Harness::new();
        let command = sealed_command(false);
        let _held = harness.lock.acquire();

        let message = harness.cipher.encrypt(&bob(), None, b"x", &command).unwrap();
        assert!(message.is_unencrypted());
    }

    #[test]
    fn test_session_encrypt_types_and_registration() {
        let harness = Harness::new();
        let command = sealed_command(true);

        let first = harness.cipher.encrypt(&bob(), None, b"hello", &command).unwrap();
        let second = harness.cipher.encrypt(&bob(), None, b"hello", &command).unwrap();

        assert_eq!(first.message_type, EnvelopeType::PrekeyBundle as u32);
        assert_eq!(second.message_type, EnvelopeType::Ciphertext as u32);
        assert_eq!(first.destination_registration_id, LOOPBACK_REGISTRATION_ID);
        assert_eq!(harness.session.calls(), 2);
        assert!(!harness.lock.is_locked());
    }

    #[test]
    fn test_session_body_is_padded() {
        let harness = Harness::new();
        let command = sealed_command(true);

        let message = harness.cipher.encrypt(&bob(), None, b"hello", &command).unwrap();
        let body = BASE64.decode(&message.content).unwrap();
        let unmasked = ufsrv_crypto::testing::session_ciphertext_for_test(&body);

        assert_eq!(unmasked.len(), 159);
        assert_eq!(strip_message_padding(&unmasked), b"hello");
    }

    #[test]
    fn test_sealed_sender_encrypt() {
        let harness = Harness::new();
        let command = sealed_command(true);
        let certificate = SenderCertificate::new("me", 1, u64::MAX, vec![1, 2]);
        let access = UnidentifiedAccess::new(vec![7; 16], certificate);

        let message = harness
            .cipher
            .encrypt(&bob(), Some(&access), b"hi", &command)
            .unwrap();

        assert_eq!(message.message_type, EnvelopeType::UnidentifiedSender as u32);
        assert_eq!(message.destination_registration_id, LOOPBACK_REGISTRATION_ID);
        assert_eq!(harness.session.calls(), 1);
        assert_eq!(harness.sealed.calls(), 1);

        let sealed = BASE64.decode(&message.content).unwrap();
        let receiver = LoopbackSealedCipher::new();
        let opened = receiver
            .decrypt(&MemoryProtocolStore::new(), &bob(), &sealed, 0)
            .unwrap();
        assert_eq!(opened.sender, ProtocolAddress::new("me", 1));
        assert_eq!(opened.message_type, CiphertextType::PreKey);
        assert_eq!(strip_message_padding(&opened.padded_message), b"hi");
    }

    #[test]
    fn test_sealed_sender_reuses_session() {
        let harness = Harness::new();
        let command = sealed_command(true);
        let certificate = SenderCertificate::new("me", 1, u64::MAX, vec![]);
        let access = UnidentifiedAccess::new(vec![7; 16], certificate);

        harness.cipher.encrypt(&bob(), None, b"first", &command).unwrap();
        let message = harness
            .cipher
            .encrypt(&bob(), Some(&access), b"second", &command)
            .unwrap();

        let sealed = BASE64.decode(&message.content).unwrap();
        let receiver_store = MemoryProtocolStore::new();
        receiver_store
            .store_session(
                &ProtocolAddress::new("me", 1),
                SessionRecord::new(CURRENT_SESSION_VERSION, 1, Vec::new()),
            )
            .unwrap();
        let opened = LoopbackSealedCipher::new()
            .decrypt(&receiver_store, &bob(), &sealed, 0)
            .unwrap();
        assert_eq!(opened.message_type, CiphertextType::Whisper);
        assert_eq!(harness.session.calls(), 2);
    }

    #[test]
    fn test_sealed_sender_session_failure_skips_seal() {
        let harness = Harness::new();
        let command = sealed_command(true);
        let certificate = SenderCertificate::new("me", 1, u64::MAX, vec![]);
        let access = UnidentifiedAccess::new(vec![7; 16], certificate);
        harness
            .session
            .fail_next(CryptoError::NoSession("bob.2".into()));

        let result = harness.cipher.encrypt(&bob(), Some(&access), b"x", &command);

        assert!(matches!(
            result,
            Err(ProtocolError::Encrypt {
                source: CryptoError::NoSession(_),
                ..
            })
        ));
        assert_eq!(harness.sealed.calls(), 0);
        assert!(!harness.lock.is_locked());
    }

    #[test]
    fn test_encrypt_failure_names_destination() {
        let harness = Harness::new();
        let command = sealed_command(true);
        harness
            .session
            .fail_next(CryptoError::UntrustedIdentity("bob".into()));

        let err = harness
            .cipher
            .encrypt(&bob(), None, b"x", &command)
            .unwrap_err();
        match err {
            ProtocolError::Encrypt {
                source,
                destination,
            } => {
                assert_eq!(source, CryptoError::UntrustedIdentity("bob".into()));
                assert_eq!(destination, "bob.2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!harness.lock.is_locked());
    }

    #[test]
    fn test_group_encrypt_single_pass() {
        let harness = Harness::new();
        let distribution_id = DistributionId::from_bytes([3; 16]);
        let certificate = SenderCertificate::new("me", 1, u64::MAX, vec![]);
        let destinations = vec![
            ProtocolAddress::new("bob", 1),
            ProtocolAddress::new("carol", 1),
            ProtocolAddress::new("carol", 2),
        ];
        let mut command = Command::from_built(StateCommand::default());
        command.finalize();

        let ciphertext = harness
            .cipher
            .encrypt_for_group(
                &distribution_id,
                &destinations,
                &certificate,
                &command.to_bytes().unwrap(),
                ContentHint::Resendable,
                Some(b"fence-9".to_vec()),
            )
            .unwrap();

        assert_eq!(harness.group.calls(), 1);
        assert_eq!(harness.sealed.multi_recipient_calls(), 1);
        assert_eq!(LoopbackSealedCipher::recipients_of(&ciphertext).unwrap(), destinations);
        assert_eq!(harness.session.calls(), 0);
    }
}
