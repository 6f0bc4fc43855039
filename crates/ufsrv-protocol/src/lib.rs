//! # ufsrv-protocol
//!
//! Command protocol and envelope cipher for ufsrv messaging.
//!
//! This crate provides:
//! - **Wire schema**: the [`CommandWire`](wire::CommandWire) wrapper, its
//!   eight sub-commands and the server [`Envelope`](wire::Envelope)
//! - **Command**: a builder/finalizer holding exactly one sub-command, with
//!   idempotent sealing and a versioned opaque form for persistence
//! - **WireEnvelope**: validated view of received envelopes
//! - **EnvelopeCipher**: encrypt/decrypt strategy selection (session, sealed
//!   sender, group, bypass, native push) normalized into [`Plaintext`]
//! - **Context adapters**: group, preview and quote projections
//!
//! ## Encryption Flag
//!
//! Every command carries an end-to-end encryption flag, on by default. When
//! it is off the cipher is bypassed and the body travels as base64 of the
//! raw command bytes. The flag is written into the sealed wrapper header so
//! receivers can see the sender's declaration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attachment;
pub mod cipher;
pub mod command;
pub mod context;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod limits;
pub mod outgoing;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod proptests;

pub use attachment::{AttachmentPointer, adapt_attachment_records};
pub use cipher::{
    CipherBackends, DecryptPath, DecryptPolicy, EnvelopeCipher, EnvelopeMetadata, Plaintext,
};
pub use command::{
    Command, CommandKind, SubCommand, TransportType, declares_e2ee, payload_attachments,
    payload_header, payload_kind,
};
pub use context::{
    GroupContext, GroupContextType, LinkPreview, Quote, QuoteAttachment, RecipientResolver,
};
pub use credentials::{CredentialsProvider, StaticCredentialsProvider};
pub use envelope::{EnvelopeBody, WireEnvelope, WireEnvelopeBuilder};
pub use error::{ProtocolError, Result};
pub use outgoing::{OutgoingPushMessage, OutgoingPushMessageList, UNENCRYPTED_MESSAGE_TYPE};
pub use transport::{pad_message_body, strip_message_padding};
