//! Envelope protobuf as delivered by the server.
//!
//! Field numbers 1-11 follow the Signal service envelope. ufsrv adds the
//! embedded command (15), the ufsrv uid of the source (16) and the server
//! delivery timestamp (17).

use prost::{Enumeration, Message};

use super::command::CommandWire;

/// Envelope type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EnvelopeType {
    /// Unencrypted ufsrv transport (sentinel).
    Unknown = 0,
    /// Session ciphertext.
    Ciphertext = 1,
    /// Retired key exchange.
    KeyExchange = 2,
    /// Session ciphertext with pre-key handshake.
    PrekeyBundle = 3,
    /// Server-generated delivery receipt.
    Receipt = 5,
    /// Sealed-sender ciphertext.
    UnidentifiedSender = 6,
    /// Plaintext control content.
    PlaintextContent = 8,
}

/// Raw envelope message.
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    /// Envelope type.
    #[prost(enumeration = "EnvelopeType", optional, tag = "1")]
    pub r#type: Option<i32>,
    /// Source phone number / legacy identifier.
    #[prost(string, optional, tag = "2")]
    pub source_e164: Option<String>,
    /// Relay name.
    #[prost(string, optional, tag = "3")]
    pub relay: Option<String>,
    /// Client timestamp in milliseconds.
    #[prost(uint64, optional, tag = "5")]
    pub timestamp: Option<u64>,
    /// Legacy message slot.
    #[prost(bytes = "vec", optional, tag = "6")]
    pub legacy_message: Option<Vec<u8>>,
    /// Source device id.
    #[prost(uint32, optional, tag = "7")]
    pub source_device: Option<u32>,
    /// Content slot.
    #[prost(bytes = "vec", optional, tag = "8")]
    pub content: Option<Vec<u8>>,
    /// Server-assigned guid.
    #[prost(string, optional, tag = "9")]
    pub server_guid: Option<String>,
    /// Server receive timestamp in milliseconds.
    #[prost(uint64, optional, tag = "10")]
    pub server_timestamp: Option<u64>,
    /// Source service uuid.
    #[prost(string, optional, tag = "11")]
    pub source_uuid: Option<String>,
    /// Embedded ufsrv command.
    #[prost(message, optional, tag = "15")]
    pub ufsrv_command: Option<CommandWire>,
    /// Source ufsrv uid.
    #[prost(string, optional, tag = "16")]
    pub source_ufsrv_uid: Option<String>,
    /// Server delivery timestamp in milliseconds.
    #[prost(uint64, optional, tag = "17")]
    pub server_delivered_timestamp: Option<u64>,
}
