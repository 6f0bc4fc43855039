use prost::Message;
use tracing::{debug, warn};
use ufsrv_crypto::{CiphertextType, CryptoError, ProtocolAddress};

use super::{DecryptPath, EnvelopeCipher, EnvelopeMetadata, Plaintext, decrypt_error};
use crate::envelope::{EnvelopeBody, WireEnvelope};
use crate::limits::PLAINTEXT_CONTENT_IDENTIFIER;
use crate::transport::strip_message_padding;
use crate::{ProtocolError, Result};

impl EnvelopeCipher {
    /// Turn a received envelope into plaintext and metadata.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Decrypt`] carrying the cipher error, the nominal
    ///   sender and device
    /// - [`ProtocolError::InvalidEnvelope`] for a receipt with no body
    pub fn decrypt(&self, envelope: &WireEnvelope) -> Result<Plaintext> {
        match envelope.body() {
            EnvelopeBody::Legacy(body) if self.legacy_bypass_declared(envelope) => {
                debug!(
                    sender = envelope.source().identifier().unwrap_or("unknown"),
                    kind = ?envelope.embedded_kind(),
                    "Sender declared no end-to-end encryption, bypassing decrypt"
                );
                Ok(Plaintext {
                    metadata: EnvelopeMetadata::from_envelope(
                        envelope,
                        DecryptPath::Bypassed,
                        envelope.embedded_needs_receipt(),
                    ),
                    data: body.clone(),
                })
            }
            EnvelopeBody::Legacy(body) | EnvelopeBody::Content(body) => {
                self.decrypt_body(envelope, body)
            }
            EnvelopeBody::NativePush => Ok(native_push(envelope)),
            EnvelopeBody::Empty => Err(ProtocolError::InvalidEnvelope(
                "envelope carries nothing to decrypt".into(),
            )),
        }
    }

    fn legacy_bypass_declared(&self, envelope: &WireEnvelope) -> bool {
        self.policy.trust_sender_e2ee_flag && envelope.declares_legacy_bypass()
    }

    fn decrypt_body(&self, envelope: &WireEnvelope, ciphertext: &[u8]) -> Result<Plaintext> {
        if envelope.is_unidentified_sender() {
            return self.decrypt_sealed(envelope, ciphertext);
        }

        if !envelope.has_source() {
            return Err(decrypt_error(
                envelope,
                CryptoError::InvalidMessageStructure("non-sealed envelope without source".into()),
            ));
        }

        let metadata = EnvelopeMetadata::from_envelope(envelope, DecryptPath::Decrypted, false);
        let store = self.store.as_ref();

        let padded = if envelope.is_prekey_bundle() {
            let _guard = self.lock.acquire();
            let address = self.preferred_address(envelope)?;
            let padded = self
                .backends
                .session
                .decrypt_prekey(store, &address, ciphertext)
                .map_err(|e| decrypt_error(envelope, e))?;
            store
                .clear_sender_key_shared_with(std::slice::from_ref(&address))
                .map_err(|e| decrypt_error(envelope, e))?;
            padded
        } else if envelope.is_signal_message() {
            let _guard = self.lock.acquire();
            let address = self.preferred_address(envelope)?;
            self.backends
                .session
                .decrypt_whisper(store, &address, ciphertext)
                .map_err(|e| decrypt_error(envelope, e))?
        } else if envelope.is_plaintext_content() {
            match ciphertext.split_first() {
                Some((&PLAINTEXT_CONTENT_IDENTIFIER, body)) => body.to_vec(),
                _ => {
                    return Err(decrypt_error(
                        envelope,
                        CryptoError::InvalidMessage("missing plaintext content identifier".into()),
                    ));
                }
            }
        } else {
            return Err(decrypt_error(
                envelope,
                CryptoError::InvalidMetadata("unknown type".into()),
            ));
        };

        Ok(Plaintext {
            metadata,
            data: strip_message_padding(&padded),
        })
    }

    fn decrypt_sealed(&self, envelope: &WireEnvelope, ciphertext: &[u8]) -> Result<Plaintext> {
        let store = self.store.as_ref();
        let _guard = self.lock.acquire();

        let opened = self
            .backends
            .sealed
            .decrypt(store, &self.local, ciphertext, envelope.server_timestamp())
            .map_err(|e| decrypt_error(envelope, e))?;

        if opened.message_type == CiphertextType::PreKey {
            store
                .clear_sender_key_shared_with(std::slice::from_ref(&opened.sender))
                .map_err(|e| decrypt_error(envelope, e))?;
        }

        let needs_receipt = if envelope.has_source() {
            warn!(
                sender = %opened.sender,
                source = %envelope.source(),
                "Sealed envelope received over an identified channel"
            );
            false
        } else {
            true
        };

        let mut metadata =
            EnvelopeMetadata::from_envelope(envelope, DecryptPath::Decrypted, needs_receipt);
        metadata.sender = opened.sender.name().to_string();
        metadata.sender_device = opened.sender.device_id();
        metadata.group_id = opened.group_id;

        Ok(Plaintext {
            metadata,
            data: strip_message_padding(&opened.padded_message),
        })
    }

    /// Session address for the envelope's source: the first identity the
    /// store holds a session for, else the primary identifier.
    fn preferred_address(&self, envelope: &WireEnvelope) -> Result<ProtocolAddress> {
        let source = envelope.source();
        let device = envelope.source_device();

        for name in [source.uuid(), source.ufsrv_uid()].into_iter().flatten() {
            let address = ProtocolAddress::new(name, device);
            if self
                .store
                .contains_session(&address)
                .map_err(|e| decrypt_error(envelope, e))?
            {
                return Ok(address);
            }
        }

        source.protocol_address(device).ok_or_else(|| {
            decrypt_error(
                envelope,
                CryptoError::InvalidMessageStructure("envelope has no source".into()),
            )
        })
    }
}

fn native_push(envelope: &WireEnvelope) -> Plaintext {
    let data = envelope
        .embedded_command()
        .map(Message::encode_to_vec)
        .unwrap_or_default();

    Plaintext {
        metadata: EnvelopeMetadata::from_envelope(
            envelope,
            DecryptPath::NativePush,
            envelope.embedded_needs_receipt(),
        ),
        data,
    }
}
