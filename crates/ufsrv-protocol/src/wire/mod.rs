//! Protobuf schema exchanged with the ufsrv server.
//!
//! The messages are declared with `prost` derives so the schema lives next to
//! the code that uses it. Field numbers are part of the server contract.

pub mod command;
pub mod envelope;

pub use command::{
    ATTACHMENT_FLAG_VOICE_MESSAGE, AttachmentRecord, CallCommand, CommandHeader, CommandWire,
    FenceCommand, FenceRecord, LocationCommand, MessageCommand, MessageRecord, PreviewRecord,
    QuotedAttachment, QuotedMessageRecord, ReceiptCommand, ReceiptType, StateCommand, SyncCommand,
    UfsrvType, UserCommand, UserRecord, command_wire,
};
pub use envelope::{Envelope, EnvelopeType};
