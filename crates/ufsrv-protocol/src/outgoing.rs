//! Outgoing per-device messages and the list posted to the server.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// Envelope type code marking an unencrypted (bypassed) body.
pub const UNENCRYPTED_MESSAGE_TYPE: u32 = 0;

/// One encrypted (or bypassed) body for one destination device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPushMessage {
    /// Envelope type code.
    #[serde(rename = "type")]
    pub message_type: u32,
    /// Destination device id.
    pub destination_device_id: u32,
    /// Destination registration id; zero when no session was used.
    pub destination_registration_id: u32,
    /// Base64 body.
    pub content: String,
}

impl OutgoingPushMessage {
    /// Whether the body skipped end-to-end encryption.
    pub fn is_unencrypted(&self) -> bool {
        self.message_type == UNENCRYPTED_MESSAGE_TYPE
    }
}

/// Messages for every device of one destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPushMessageList {
    /// Destination account identifier.
    pub destination: String,
    /// Client timestamp in milliseconds.
    pub timestamp: u64,
    /// Per-device messages.
    pub messages: Vec<OutgoingPushMessage>,
    /// Whether this is an online-only (ephemeral) send.
    pub online: bool,
}

impl OutgoingPushMessageList {
    /// Create a list.
    pub fn new(
        destination: impl Into<String>,
        timestamp: u64,
        messages: Vec<OutgoingPushMessage>,
        online: bool,
    ) -> Self {
        Self {
            destination: destination.into(),
            timestamp,
            messages,
            online,
        }
    }

    /// Destination device ids, in message order.
    pub fn devices(&self) -> Vec<u32> {
        self.messages
            .iter()
            .map(|m| m.destination_device_id)
            .collect()
    }

    /// JSON body for the transport layer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}
