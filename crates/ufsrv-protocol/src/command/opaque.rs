//! Versioned opaque form of a command, for persisting and resuming sends.
//!
//! Layout: one format version byte followed by a bincode snapshot. The
//! snapshot keeps the kind, the flags and the encoded wire wrapper; a
//! command still holding a staged sub-command cannot be persisted.

use prost::Message;
use serde::{Deserialize, Serialize};

use super::{Command, CommandKind, Stage, TransportType, payload_kind};
use crate::limits::{MAX_OPAQUE_SIZE, OPAQUE_FORMAT_VERSION};
use crate::wire::CommandWire;
use crate::{ProtocolError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    kind: CommandKind,
    transport_type: TransportType,
    e2ee: bool,
    integrity_sensitive: bool,
    wire_built: bool,
    wire: Vec<u8>,
}

impl Command {
    /// Serialize the whole command into its opaque form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotBuilt`] if the sub-command is still staged.
    pub fn serialize_opaque(&self) -> Result<Vec<u8>> {
        let (wire_built, wire) = match &self.stage {
            Stage::Staged(_) => {
                return Err(ProtocolError::NotBuilt {
                    stage: "sub-command",
                });
            }
            Stage::SubBuilt(wire) => (false, wire.encode_to_vec()),
            Stage::Sealed { bytes, .. } => (true, bytes.clone()),
        };

        let snapshot = Snapshot {
            kind: self.kind,
            transport_type: self.transport_type,
            e2ee: self.e2ee,
            integrity_sensitive: self.integrity_sensitive,
            wire_built,
            wire,
        };
        encode_snapshot(&snapshot)
    }

    /// Restore a command from its opaque form.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnsupportedVersion`] for an unknown format version
    /// - [`ProtocolError::Serialization`] for a corrupt snapshot
    /// - [`ProtocolError::Decode`] for a corrupt wire wrapper
    /// - [`ProtocolError::Build`] if the snapshot kind has no matching payload
    pub fn deserialize_opaque(blob: &[u8]) -> Result<Self> {
        if blob.len() > MAX_OPAQUE_SIZE {
            return Err(ProtocolError::TooLarge {
                what: "opaque command",
                actual: blob.len(),
                max: MAX_OPAQUE_SIZE,
            });
        }
        let (&version, body) = blob
            .split_first()
            .ok_or_else(|| ProtocolError::Serialization("empty opaque command".into()))?;
        if version != OPAQUE_FORMAT_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let snapshot: Snapshot =
            bincode::deserialize(body).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        let wire = CommandWire::decode(snapshot.wire.as_slice())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;

        let payload = wire
            .payload
            .as_ref()
            .ok_or_else(|| ProtocolError::Build("snapshot carries no sub-command".into()))?;
        if payload_kind(payload) != snapshot.kind {
            return Err(ProtocolError::Build(format!(
                "snapshot kind {} holds a {} payload",
                snapshot.kind,
                payload_kind(payload)
            )));
        }

        let stage = if snapshot.wire_built {
            Stage::Sealed {
                wire,
                bytes: snapshot.wire,
            }
        } else {
            Stage::SubBuilt(wire)
        };

        Ok(Self {
            kind: snapshot.kind,
            stage,
            transport_type: snapshot.transport_type,
            e2ee: snapshot.e2ee,
            integrity_sensitive: snapshot.integrity_sensitive,
        })
    }
}

fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let body =
        bincode::serialize(snapshot).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    let mut blob = Vec::with_capacity(body.len() + 1);
    blob.push(OPAQUE_FORMAT_VERSION);
    blob.extend_from_slice(&body);
    Ok(blob)
}
