//! Command wire wrapper and sub-command messages.
//!
//! ```text
//! CommandWire
//!   header      = 1   CommandHeader { command, path, when, e2ee, .. }
//!   ufsrvtype   = 2   UfsrvType
//!   oneof payload
//!     fence_command   = 3
//!     msg_command     = 4
//!     loc_command     = 5
//!     user_command    = 6
//!     call_command    = 7
//!     receipt_command = 8
//!     sync_command    = 9
//!     state_command   = 10
//! ```
//!
//! Field numbers are exchanged with the server and must never change.

use prost::{Enumeration, Message};

/// Wire type tag of the outer wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum UfsrvType {
    /// Session command (no payload slot).
    Session = 0,
    /// Fence (group) command.
    Fence = 1,
    /// Message command.
    Message = 2,
    /// Location command.
    Location = 3,
    /// User command.
    User = 4,
    /// Call command.
    Call = 5,
    /// Receipt command.
    Receipt = 6,
    /// Sync command.
    Sync = 7,
    /// Activity-state (system) command.
    State = 8,
}

/// Common header carried by every sub-command and by the outer wrapper.
#[derive(Clone, PartialEq, Message)]
pub struct CommandHeader {
    /// Command verb, interpreted per sub-command.
    #[prost(uint32, tag = "1")]
    pub command: u32,
    /// Command arguments (sub-verb).
    #[prost(uint32, tag = "2")]
    pub args: u32,
    /// Server time in milliseconds.
    #[prost(uint64, tag = "3")]
    pub when: u64,
    /// Event id.
    #[prost(uint64, tag = "4")]
    pub eid: u64,
    /// Connection id.
    #[prost(uint64, tag = "5")]
    pub cid: u64,
    /// Originator username.
    #[prost(string, tag = "6")]
    pub uname: String,
    /// Originator ufsrv uid (raw).
    #[prost(bytes = "vec", tag = "7")]
    pub ufsrvuid: Vec<u8>,
    /// Group id.
    #[prost(uint64, tag = "8")]
    pub gid: u64,
    /// Client time in milliseconds.
    #[prost(uint64, tag = "9")]
    pub when_client: u64,
    /// Error code for rejected arguments.
    #[prost(uint32, tag = "10")]
    pub args_error: u32,
    /// Server route.
    #[prost(string, tag = "11")]
    pub path: String,
    /// Sender's end-to-end encryption declaration.
    #[prost(bool, optional, tag = "12")]
    pub e2ee: Option<bool>,
}

/// Attachment as carried inside commands.
#[derive(Clone, PartialEq, Message)]
pub struct AttachmentRecord {
    /// Ufsrv file id.
    #[prost(string, tag = "1")]
    pub id: String,
    /// MIME type.
    #[prost(string, tag = "2")]
    pub content_type: String,
    /// Attachment encryption key.
    #[prost(bytes = "vec", tag = "3")]
    pub key: Vec<u8>,
    /// Plaintext size.
    #[prost(uint32, optional, tag = "4")]
    pub size: Option<u32>,
    /// Inline thumbnail.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub thumbnail: Option<Vec<u8>>,
    /// Ciphertext digest.
    #[prost(bytes = "vec", optional, tag = "6")]
    pub digest: Option<Vec<u8>>,
    /// Original file name.
    #[prost(string, optional, tag = "7")]
    pub file_name: Option<String>,
    /// Attachment flags.
    #[prost(uint32, tag = "8")]
    pub flags: u32,
    /// Width in pixels.
    #[prost(uint32, tag = "9")]
    pub width: u32,
    /// Height in pixels.
    #[prost(uint32, tag = "10")]
    pub height: u32,
    /// Caption.
    #[prost(string, optional, tag = "11")]
    pub caption: Option<String>,
    /// Blur-hash placeholder.
    #[prost(string, optional, tag = "12")]
    pub blur_hash: Option<String>,
}

/// Flag bit marking an attachment as a voice note.
pub const ATTACHMENT_FLAG_VOICE_MESSAGE: u32 = 1;

/// A user reference.
#[derive(Clone, PartialEq, Message)]
pub struct UserRecord {
    /// Raw ufsrv uid.
    #[prost(bytes = "vec", tag = "1")]
    pub ufsrvuid: Vec<u8>,
    /// Username or e164.
    #[prost(string, tag = "2")]
    pub username: String,
}

/// A fence (group) reference.
#[derive(Clone, PartialEq, Message)]
pub struct FenceRecord {
    /// Fence id.
    #[prost(uint64, tag = "1")]
    pub fid: u64,
    /// Display name.
    #[prost(string, tag = "2")]
    pub fname: String,
    /// Canonical name.
    #[prost(string, tag = "3")]
    pub cname: String,
    /// Avatar.
    #[prost(message, optional, tag = "4")]
    pub avatar: Option<AttachmentRecord>,
    /// Members.
    #[prost(message, repeated, tag = "5")]
    pub members: Vec<UserRecord>,
}

/// A message body.
#[derive(Clone, PartialEq, Message)]
pub struct MessageRecord {
    /// Encoded body.
    #[prost(bytes = "vec", tag = "1")]
    pub message: Vec<u8>,
}

/// An attachment referenced from a quote.
#[derive(Clone, PartialEq, Message)]
pub struct QuotedAttachment {
    /// MIME type.
    #[prost(string, tag = "1")]
    pub content_type: String,
    /// Original file name.
    #[prost(string, optional, tag = "2")]
    pub file_name: Option<String>,
    /// Thumbnail attachment.
    #[prost(message, optional, tag = "3")]
    pub thumbnail: Option<AttachmentRecord>,
}

/// A quoted message.
#[derive(Clone, PartialEq, Message)]
pub struct QuotedMessageRecord {
    /// Timestamp id of the quoted message.
    #[prost(uint64, tag = "1")]
    pub id: u64,
    /// Author identifier.
    #[prost(string, tag = "2")]
    pub author: String,
    /// Quoted text.
    #[prost(string, tag = "3")]
    pub text: String,
    /// Quoted attachments.
    #[prost(message, repeated, tag = "4")]
    pub attachments: Vec<QuotedAttachment>,
}

/// A link preview.
#[derive(Clone, PartialEq, Message)]
pub struct PreviewRecord {
    /// Previewed URL.
    #[prost(string, tag = "1")]
    pub url: String,
    /// Page title.
    #[prost(string, tag = "2")]
    pub title: String,
    /// Preview image.
    #[prost(message, optional, tag = "3")]
    pub image: Option<AttachmentRecord>,
}

/// Fence (group) lifecycle command.
#[derive(Clone, PartialEq, Message)]
pub struct FenceCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Fences addressed.
    #[prost(message, repeated, tag = "2")]
    pub fences: Vec<FenceRecord>,
    /// Attachments.
    #[prost(message, repeated, tag = "3")]
    pub attachments: Vec<AttachmentRecord>,
    /// Originating user.
    #[prost(message, optional, tag = "4")]
    pub originator: Option<UserRecord>,
}

/// Message command.
#[derive(Clone, PartialEq, Message)]
pub struct MessageCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Destination fences.
    #[prost(message, repeated, tag = "2")]
    pub fences: Vec<FenceRecord>,
    /// Destination users.
    #[prost(message, repeated, tag = "3")]
    pub to: Vec<UserRecord>,
    /// Message bodies.
    #[prost(message, repeated, tag = "4")]
    pub messages: Vec<MessageRecord>,
    /// Attachments.
    #[prost(message, repeated, tag = "5")]
    pub attachments: Vec<AttachmentRecord>,
    /// Quoted message.
    #[prost(message, optional, tag = "6")]
    pub quoted_message: Option<QuotedMessageRecord>,
    /// Link previews.
    #[prost(message, repeated, tag = "7")]
    pub previews: Vec<PreviewRecord>,
    /// Originating user.
    #[prost(message, optional, tag = "8")]
    pub originator: Option<UserRecord>,
}

/// Location update command.
#[derive(Clone, PartialEq, Message)]
pub struct LocationCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Latitude in degrees.
    #[prost(double, tag = "2")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[prost(double, tag = "3")]
    pub longitude: f64,
    /// Resolved locality.
    #[prost(string, tag = "4")]
    pub locality: String,
}

/// User profile/preference command.
#[derive(Clone, PartialEq, Message)]
pub struct UserCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Fences in scope.
    #[prost(message, repeated, tag = "2")]
    pub fences: Vec<FenceRecord>,
    /// Attachments (avatar).
    #[prost(message, repeated, tag = "3")]
    pub attachments: Vec<AttachmentRecord>,
    /// Target users.
    #[prost(message, repeated, tag = "4")]
    pub target_list: Vec<UserRecord>,
    /// Profile key.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub profile_key: Option<Vec<u8>>,
    /// Originating user.
    #[prost(message, optional, tag = "6")]
    pub originator: Option<UserRecord>,
}

/// Call signalling command.
#[derive(Clone, PartialEq, Message)]
pub struct CallCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Fence the call belongs to.
    #[prost(message, optional, tag = "2")]
    pub fence: Option<FenceRecord>,
    /// Caller.
    #[prost(message, optional, tag = "3")]
    pub originator: Option<UserRecord>,
    /// Callees.
    #[prost(message, repeated, tag = "4")]
    pub to: Vec<UserRecord>,
    /// Session description.
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
}

/// Receipt command.
#[derive(Clone, PartialEq, Message)]
pub struct ReceiptCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Receipt type.
    #[prost(enumeration = "ReceiptType", tag = "2")]
    pub receipt_type: i32,
    /// Fence of the acknowledged messages.
    #[prost(uint64, tag = "3")]
    pub fid: u64,
    /// Raw uid of the original sender.
    #[prost(bytes = "vec", tag = "4")]
    pub uid_originator: Vec<u8>,
    /// Event ids of acknowledged messages.
    #[prost(uint64, repeated, tag = "5")]
    pub eid: Vec<u64>,
    /// Timestamps of acknowledged messages.
    #[prost(uint64, repeated, tag = "6")]
    pub timestamp: Vec<u64>,
}

/// Receipt kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ReceiptType {
    /// Delivered to device.
    Delivery = 0,
    /// Read by user.
    Read = 1,
    /// Typing indicator.
    Typing = 2,
}

/// Multi-device sync command.
#[derive(Clone, PartialEq, Message)]
pub struct SyncCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Synced fences.
    #[prost(message, repeated, tag = "2")]
    pub fences: Vec<FenceRecord>,
    /// Synced contacts.
    #[prost(message, repeated, tag = "3")]
    pub contacts: Vec<UserRecord>,
}

/// Activity-state command (typing, presence and similar system state).
#[derive(Clone, PartialEq, Message)]
pub struct StateCommand {
    /// Sub-command header.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Raw uid of the originator.
    #[prost(bytes = "vec", tag = "2")]
    pub uid_originator: Vec<u8>,
    /// Fence in scope.
    #[prost(uint64, tag = "3")]
    pub fid: u64,
}

/// Outer wrapper carrying exactly one sub-command.
#[derive(Clone, PartialEq, Message)]
pub struct CommandWire {
    /// Wrapper header: sub-command verb and route.
    #[prost(message, optional, tag = "1")]
    pub header: Option<CommandHeader>,
    /// Wire type tag.
    #[prost(enumeration = "UfsrvType", tag = "2")]
    pub ufsrvtype: i32,
    /// The single sub-command.
    #[prost(oneof = "command_wire::Payload", tags = "3, 4, 5, 6, 7, 8, 9, 10")]
    pub payload: Option<command_wire::Payload>,
}

/// Nested types of [`CommandWire`].
pub mod command_wire {
    use prost::Oneof;

    /// Sub-command slot.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Payload {
        /// Fence command.
        #[prost(message, tag = "3")]
        FenceCommand(super::FenceCommand),
        /// Message command.
        #[prost(message, tag = "4")]
        MsgCommand(super::MessageCommand),
        /// Location command.
        #[prost(message, tag = "5")]
        LocCommand(super::LocationCommand),
        /// User command.
        #[prost(message, tag = "6")]
        UserCommand(super::UserCommand),
        /// Call command.
        #[prost(message, tag = "7")]
        CallCommand(super::CallCommand),
        /// Receipt command.
        #[prost(message, tag = "8")]
        ReceiptCommand(super::ReceiptCommand),
        /// Sync command.
        #[prost(message, tag = "9")]
        SyncCommand(super::SyncCommand),
        /// Activity-state command.
        #[prost(message, tag = "10")]
        StateCommand(super::StateCommand),
    }
}
