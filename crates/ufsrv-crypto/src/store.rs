//! Session and sender-key state consumed by the ciphers.
//!
//! [`ProtocolStore`] is the narrow interface the envelope cipher needs from
//! the application's key database. [`MemoryProtocolStore`] is a reference
//! implementation backed by in-process maps.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::ProtocolAddress;
use crate::cipher::DistributionId;
use crate::{CryptoError, Result};

/// Current session record version.
pub const CURRENT_SESSION_VERSION: u32 = 3;

/// Opaque ratchet state for one remote device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    version: u32,
    remote_registration_id: u32,
    state: Vec<u8>,
}

impl SessionRecord {
    /// Create a record with the given ratchet state.
    pub fn new(version: u32, remote_registration_id: u32, state: Vec<u8>) -> Self {
        Self {
            version,
            remote_registration_id,
            state,
        }
    }

    /// Session protocol version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Registration id of the remote device.
    pub fn remote_registration_id(&self) -> u32 {
        self.remote_registration_id
    }

    /// Serialized ratchet state.
    pub fn state(&self) -> &[u8] {
        &self.state
    }
}

/// Key and session storage shared by every cipher.
///
/// Implementations use interior mutability; callers serialize access to the
/// ratchet state through [`SessionLock`](crate::SessionLock).
pub trait ProtocolStore: Send + Sync {
    /// Whether a session exists for `address`.
    fn contains_session(&self, address: &ProtocolAddress) -> Result<bool>;

    /// Load the session for `address`.
    fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>>;

    /// Store or replace the session for `address`.
    fn store_session(&self, address: &ProtocolAddress, record: SessionRecord) -> Result<()>;

    /// Forget that the local sender key was shared with `addresses`.
    ///
    /// The next group send will redistribute the sender key to them.
    fn clear_sender_key_shared_with(&self, addresses: &[ProtocolAddress]) -> Result<()>;

    /// Record that the sender key for `distribution_id` reached `addresses`.
    fn mark_sender_key_shared_with(
        &self,
        distribution_id: &DistributionId,
        addresses: &[ProtocolAddress],
    ) -> Result<()>;

    /// Addresses that hold the sender key for `distribution_id`.
    fn sender_key_shared_with(&self, distribution_id: &DistributionId)
    -> Result<Vec<ProtocolAddress>>;

    /// Registration id of the remote device, read from its session.
    fn remote_registration_id(&self, address: &ProtocolAddress) -> Result<u32> {
        self.load_session(address)?
            .map(|record| record.remote_registration_id())
            .ok_or_else(|| CryptoError::NoSession(address.to_string()))
    }
}

/// In-memory [`ProtocolStore`].
#[derive(Debug, Default)]
pub struct MemoryProtocolStore {
    sessions: RwLock<HashMap<ProtocolAddress, SessionRecord>>,
    shared_sender_keys: RwLock<HashMap<DistributionId, HashSet<ProtocolAddress>>>,
}

impl MemoryProtocolStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl ProtocolStore for MemoryProtocolStore {
    fn contains_session(&self, address: &ProtocolAddress) -> Result<bool> {
        Ok(self.sessions.read().contains_key(address))
    }

    fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().get(address).cloned())
    }

    fn store_session(&self, address: &ProtocolAddress, record: SessionRecord) -> Result<()> {
        self.sessions.write().insert(address.clone(), record);
        Ok(())
    }

    fn clear_sender_key_shared_with(&self, addresses: &[ProtocolAddress]) -> Result<()> {
        let mut shared = self.shared_sender_keys.write();
        for holders in shared.values_mut() {
            for address in addresses {
                holders.remove(address);
            }
        }
        debug!(count = addresses.len(), "Cleared shared sender keys");
        Ok(())
    }

    fn mark_sender_key_shared_with(
        &self,
        distribution_id: &DistributionId,
        addresses: &[ProtocolAddress],
    ) -> Result<()> {
        self.shared_sender_keys
            .write()
            .entry(*distribution_id)
            .or_default()
            .extend(addresses.iter().cloned());
        Ok(())
    }

    fn sender_key_shared_with(
        &self,
        distribution_id: &DistributionId,
    ) -> Result<Vec<ProtocolAddress>> {
        let mut holders: Vec<ProtocolAddress> = self
            .shared_sender_keys
            .read()
            .get(distribution_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        holders.sort();
        Ok(holders)
    }
}
