//! Receive side: envelopes in, commands or recovery actions out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use ufsrv_crypto::{CryptoError, Recovery};
use ufsrv_protocol::{
    Command, EnvelopeBody, EnvelopeCipher, EnvelopeMetadata, ProtocolError, WireEnvelope,
};

/// A successfully received command.
#[derive(Clone, Debug)]
pub struct ReceivedCommand {
    /// Normalized envelope metadata.
    pub metadata: EnvelopeMetadata,
    /// The command, when the plaintext is a wire wrapper.
    pub command: Option<Command>,
    /// Unpadded plaintext.
    pub data: Vec<u8>,
}

/// What the caller should do with a received envelope.
#[derive(Clone, Debug)]
pub enum ReceiveOutcome {
    /// Plaintext recovered.
    Delivered(ReceivedCommand),
    /// Server delivery receipt; nothing to decrypt.
    Receipt {
        /// Account that received the original message.
        sender: String,
        /// Its device.
        device: u32,
        /// Timestamp of the original message.
        timestamp: u64,
    },
    /// Replay; drop without telling the user.
    Dropped {
        /// Cipher error text.
        reason: String,
    },
    /// Sender's identity key changed and needs verification.
    IdentityVerificationRequired {
        /// Sender identifier.
        sender: String,
        /// Sender device.
        device: u32,
    },
    /// No usable session with the sender.
    SessionResetRequired {
        /// Sender identifier.
        sender: String,
        /// Sender device.
        device: u32,
    },
    /// Malformed or undecryptable; surface and drop.
    Rejected {
        /// Why the envelope was rejected.
        reason: String,
    },
}

impl ReceiveOutcome {
    /// Short label for logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::Receipt { .. } => "receipt",
            Self::Dropped { .. } => "dropped",
            Self::IdentityVerificationRequired { .. } => "identity-verification-required",
            Self::SessionResetRequired { .. } => "session-reset-required",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Whether plaintext was recovered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Counts of outcomes in a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveSummary {
    /// Delivered envelopes.
    pub delivered: usize,
    /// Delivery receipts.
    pub receipts: usize,
    /// Silently dropped replays.
    pub dropped: usize,
    /// Envelopes awaiting identity verification.
    pub identity_verification: usize,
    /// Envelopes awaiting a session reset.
    pub session_reset: usize,
    /// Rejected envelopes.
    pub rejected: usize,
}

impl ReceiveSummary {
    /// Tally `outcomes`.
    pub fn of(outcomes: &[ReceiveOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                ReceiveOutcome::Delivered(_) => summary.delivered += 1,
                ReceiveOutcome::Receipt { .. } => summary.receipts += 1,
                ReceiveOutcome::Dropped { .. } => summary.dropped += 1,
                ReceiveOutcome::IdentityVerificationRequired { .. } => {
                    summary.identity_verification += 1
                }
                ReceiveOutcome::SessionResetRequired { .. } => summary.session_reset += 1,
                ReceiveOutcome::Rejected { .. } => summary.rejected += 1,
            }
        }
        summary
    }
}

/// Decodes and decrypts envelopes for one local account.
#[derive(Clone)]
pub struct EnvelopeProcessor {
    cipher: Arc<EnvelopeCipher>,
}

impl EnvelopeProcessor {
    /// Create a processor around `cipher`.
    pub fn new(cipher: Arc<EnvelopeCipher>) -> Self {
        Self { cipher }
    }

    /// Decode and process a serialized envelope.
    pub fn process_bytes(&self, bytes: &[u8]) -> ReceiveOutcome {
        match WireEnvelope::from_bytes(bytes) {
            Ok(envelope) => self.process(&envelope),
            Err(error) => {
                warn!(%error, len = bytes.len(), "Undecodable envelope");
                ReceiveOutcome::Rejected {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Process a decoded envelope.
    pub fn process(&self, envelope: &WireEnvelope) -> ReceiveOutcome {
        if matches!(envelope.body(), EnvelopeBody::Empty) {
            return ReceiveOutcome::Receipt {
                sender: envelope.source().identifier().unwrap_or_default().to_string(),
                device: envelope.source_device(),
                timestamp: envelope.timestamp(),
            };
        }

        match self.cipher.decrypt(envelope) {
            Ok(plaintext) => {
                let command = match Command::from_bytes(&plaintext.data) {
                    Ok(command) => Some(command),
                    Err(error) => {
                        debug!(%error, "Plaintext is not a command wrapper");
                        None
                    }
                };
                debug!(
                    sender = %plaintext.metadata.sender,
                    path = ?plaintext.metadata.path,
                    kind = ?command.as_ref().map(Command::kind),
                    "Envelope delivered"
                );
                ReceiveOutcome::Delivered(ReceivedCommand {
                    metadata: plaintext.metadata,
                    command,
                    data: plaintext.data,
                })
            }
            Err(error) => recover(error),
        }
    }
}

fn recover(error: ProtocolError) -> ReceiveOutcome {
    let (source, sender, device) = match error {
        ProtocolError::Decrypt {
            source,
            sender,
            device,
        } => (source, sender, device),
        other => {
            warn!(error = %other, "Envelope rejected");
            return ReceiveOutcome::Rejected {
                reason: other.to_string(),
            };
        }
    };

    match source.recovery() {
        Recovery::DropSilently => {
            debug!(%sender, device, "Duplicate message dropped");
            ReceiveOutcome::Dropped {
                reason: source.to_string(),
            }
        }
        Recovery::VerifyIdentity => {
            info!(%sender, device, "Untrusted identity");
            ReceiveOutcome::IdentityVerificationRequired { sender, device }
        }
        Recovery::ReestablishSession => {
            info!(%sender, device, "No session with sender");
            ReceiveOutcome::SessionResetRequired { sender, device }
        }
        Recovery::SurfaceAndDrop => {
            warn!(%sender, device, error = %source, "Undecryptable envelope");
            ReceiveOutcome::Rejected {
                reason: describe(&source, &sender, device),
            }
        }
    }
}

fn describe(source: &CryptoError, sender: &str, device: u32) -> String {
    format!("{source} (from {sender}.{device})")
}
