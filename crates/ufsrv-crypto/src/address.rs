//! Addressing for ratchet sessions.
//!
//! A [`ProtocolAddress`] names one device of one account and keys every
//! session record. A [`ServiceAddress`] is the account-level identity as it
//! travels on the wire: a service uuid, a ufsrv uid, or both.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device id used when the sender did not declare one.
pub const DEFAULT_DEVICE_ID: u32 = 1;

/// Identifier of one device session: account name plus device id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolAddress {
    name: String,
    device_id: u32,
}

impl ProtocolAddress {
    /// Create an address for `name` on `device_id`.
    pub fn new(name: impl Into<String>, device_id: u32) -> Self {
        Self {
            name: name.into(),
            device_id,
        }
    }

    /// Account name (service uuid or ufsrv uid).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device id.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.device_id)
    }
}

/// Account identity carried by envelopes and commands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    uuid: Option<String>,
    ufsrv_uid: Option<String>,
}

impl ServiceAddress {
    /// Build an address from its optional parts.
    ///
    /// Empty strings are treated as absent.
    pub fn new(uuid: Option<String>, ufsrv_uid: Option<String>) -> Self {
        Self {
            uuid: uuid.filter(|s| !s.is_empty()),
            ufsrv_uid: ufsrv_uid.filter(|s| !s.is_empty()),
        }
    }

    /// Address known only by service uuid.
    pub fn from_uuid(uuid: impl Into<String>) -> Self {
        Self::new(Some(uuid.into()), None)
    }

    /// Address known only by ufsrv uid.
    pub fn from_ufsrv_uid(uid: impl Into<String>) -> Self {
        Self::new(None, Some(uid.into()))
    }

    /// Service uuid, if known.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Ufsrv uid, if known.
    pub fn ufsrv_uid(&self) -> Option<&str> {
        self.ufsrv_uid.as_deref()
    }

    /// Whether neither identifier is present.
    pub fn is_empty(&self) -> bool {
        self.uuid.is_none() && self.ufsrv_uid.is_none()
    }

    /// Primary identifier: the uuid when present, else the ufsrv uid.
    pub fn identifier(&self) -> Option<&str> {
        self.uuid().or_else(|| self.ufsrv_uid())
    }

    /// Session address for `device_id` keyed by the primary identifier.
    pub fn protocol_address(&self, device_id: u32) -> Option<ProtocolAddress> {
        self.identifier()
            .map(|name| ProtocolAddress::new(name, device_id))
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.uuid(), self.ufsrv_uid()) {
            (Some(uuid), Some(uid)) => write!(f, "{uuid} ({uid})"),
            (Some(uuid), None) => f.write_str(uuid),
            (None, Some(uid)) => f.write_str(uid),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_prefers_uuid() {
        let addr = ServiceAddress::new(Some("uuid-1".into()), Some("42".into()));
        assert_eq!(addr.identifier(), Some("uuid-1"));

        let addr = ServiceAddress::from_ufsrv_uid("42");
        assert_eq!(addr.identifier(), Some("42"));
    }

    #[test]
    fn test_empty_parts_are_absent() {
        let addr = ServiceAddress::new(Some(String::new()), Some(String::new()));
        assert!(addr.is_empty());
        assert!(addr.protocol_address(1).is_none());
    }

    #[test]
    fn test_protocol_address_display() {
        let addr = ProtocolAddress::new("alice", 3);
        assert_eq!(addr.to_string(), "alice.3");
        assert_eq!(addr.device_id(), 3);
    }
}
