//! Command builder and finalizer.
//!
//! A [`Command`] carries exactly one sub-command and moves through three
//! stages:
//!
//! ```text
//! Staged(payload) --finalize--> SubBuilt(wire) --finalize--> Sealed(wire, bytes)
//!        ^                             ^
//!   from_builder                   from_built
//! ```
//!
//! - **Staged**: the sub-command is still mutable; attachments may be added.
//! - **SubBuilt**: the sub-command is frozen and the wire wrapper has been
//!   derived from it (route path included).
//! - **Sealed**: the wire wrapper has been encoded; its bytes never change.
//!
//! The stages are a sum type, so a command can never hold both a staged and a
//! built payload, and "sealed" implies "sub-built" by construction.
//!
//! ## Example
//!
//! ```ignore
//! use ufsrv_protocol::{AttachmentPointer, Command};
//! use ufsrv_protocol::wire::FenceCommand;
//!
//! let mut command = Command::from_builder(FenceCommand::default());
//! command.include_attachments(&[AttachmentPointer::default()]);
//! command.finalize();
//! let bytes = command.to_bytes()?;
//! ```

mod kind;
mod opaque;
mod sub;

pub use kind::{CommandKind, TransportType};
pub use sub::{SubCommand, payload_attachments, payload_header, payload_kind};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost::Message;
use tracing::{debug, warn};

use crate::attachment::{AttachmentPointer, adapt_attachment_records};
use crate::credentials::CredentialsProvider;
use crate::limits::MAX_COMMAND_SIZE;
use crate::wire::command_wire::Payload;
use crate::wire::{CommandHeader, CommandWire};
use crate::{ProtocolError, Result};

#[derive(Clone, Debug, PartialEq)]
enum Stage {
    Staged(Payload),
    SubBuilt(CommandWire),
    Sealed { wire: CommandWire, bytes: Vec<u8> },
}

/// One application command and its wire wrapper.
///
/// Mutators take `&mut self`: a command has a single writer and is not meant
/// to be shared while it is being built.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    kind: CommandKind,
    stage: Stage,
    transport_type: TransportType,
    e2ee: bool,
    integrity_sensitive: bool,
}

impl Command {
    /// Create a command from a finished sub-command.
    ///
    /// The wire wrapper is derived immediately; [`finalize`](Self::finalize)
    /// still has to seal it.
    pub fn from_built<S: SubCommand>(sub_command: S) -> Self {
        Self::with_stage(
            S::KIND,
            Stage::SubBuilt(derive_wire(S::KIND, sub_command.into_payload())),
        )
    }

    /// Create a command whose sub-command is still being assembled.
    pub fn from_builder<S: SubCommand>(builder: S) -> Self {
        Self::with_stage(S::KIND, Stage::Staged(builder.into_payload()))
    }

    /// Adopt a wire wrapper received from the network.
    ///
    /// The end-to-end flag is taken from the wrapper's header declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the wrapper carries no sub-command
    /// or its type tag disagrees with the populated slot.
    pub fn from_wire(wire: CommandWire) -> Result<Self> {
        let kind = validate_wire(&wire)?;
        let e2ee = declares_e2ee(&wire);
        let bytes = wire.encode_to_vec();
        let mut command = Self::with_stage(kind, Stage::Sealed { wire, bytes });
        command.e2ee = e2ee;
        Ok(command)
    }

    /// Decode a sealed wire wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TooLarge`] or [`ProtocolError::Decode`] for
    /// oversized or malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_COMMAND_SIZE {
            return Err(ProtocolError::TooLarge {
                what: "command",
                actual: bytes.len(),
                max: MAX_COMMAND_SIZE,
            });
        }
        let wire = CommandWire::decode(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Self::from_wire(wire)
    }

    fn with_stage(kind: CommandKind, stage: Stage) -> Self {
        Self {
            kind,
            stage,
            transport_type: TransportType::default(),
            e2ee: true,
            integrity_sensitive: false,
        }
    }

    /// Set the end-to-end encryption flag.
    ///
    /// Ignored once the wire wrapper is sealed, since the sealed header
    /// already carries the declaration.
    pub fn with_e2ee(mut self, e2ee: bool) -> Self {
        if self.is_wire_built() {
            warn!(kind = %self.kind, "Ignoring e2ee change on a sealed command");
        } else {
            self.e2ee = e2ee;
        }
        self
    }

    /// Set the delivery channel.
    pub fn with_transport(mut self, transport_type: TransportType) -> Self {
        self.transport_type = transport_type;
        self
    }

    /// Mark the command as requiring an integrity token.
    pub fn with_integrity_sensitive(mut self, sensitive: bool) -> Self {
        self.integrity_sensitive = sensitive;
        self
    }

    /// Command kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Delivery channel.
    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    /// Whether the cipher must apply end-to-end encryption.
    pub fn is_e2ee(&self) -> bool {
        self.e2ee
    }

    /// Whether an integrity token is required.
    pub fn is_integrity_sensitive(&self) -> bool {
        self.integrity_sensitive
    }

    /// Whether the sub-command is frozen.
    pub fn is_sub_built(&self) -> bool {
        !matches!(self.stage, Stage::Staged(_))
    }

    /// Whether the wire wrapper is sealed.
    pub fn is_wire_built(&self) -> bool {
        matches!(self.stage, Stage::Sealed { .. })
    }

    /// The sub-command, in whichever stage it is.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.stage {
            Stage::Staged(payload) => Some(payload),
            Stage::SubBuilt(wire) | Stage::Sealed { wire, .. } => wire.payload.as_ref(),
        }
    }

    /// Header of the sub-command.
    pub fn header(&self) -> Option<&CommandHeader> {
        self.payload().and_then(payload_header)
    }

    /// The wire wrapper, once the sub-command is built.
    pub fn wire(&self) -> Option<&CommandWire> {
        match &self.stage {
            Stage::Staged(_) => None,
            Stage::SubBuilt(wire) | Stage::Sealed { wire, .. } => Some(wire),
        }
    }

    /// Number of attachments on the sub-command.
    pub fn attachment_count(&self) -> usize {
        self.payload().map_or(0, |p| payload_attachments(p).len())
    }

    /// Server route, available once the sub-command is built.
    pub fn server_path(&self) -> Option<&'static str> {
        if self.is_sub_built() {
            self.kind.server_path()
        } else {
            None
        }
    }

    /// Request target used when posting the command; currently the bare route.
    pub fn server_path_args(&self) -> Option<String> {
        self.server_path().map(str::to_string)
    }

    /// Append attachments to a staged sub-command.
    ///
    /// Only fence, message and user commands carry attachments. Once the
    /// sub-command is built the call is a logged no-op. Returns the number of
    /// attachments appended.
    pub fn include_attachments(&mut self, pointers: &[AttachmentPointer]) -> usize {
        if !self.kind.accepts_attachments() {
            debug!(kind = %self.kind, "Command kind does not carry attachments");
            return 0;
        }

        let Stage::Staged(payload) = &mut self.stage else {
            debug!(
                kind = %self.kind,
                count = pointers.len(),
                "Sub-command already built, attachments not included"
            );
            return 0;
        };

        match sub::payload_attachments_mut(payload) {
            Some(attachments) => {
                attachments.extend(adapt_attachment_records(pointers));
                pointers.len()
            }
            None => 0,
        }
    }

    /// Build the sub-command, derive the wire wrapper and seal it.
    ///
    /// Idempotent: once sealed, further calls leave the command unchanged.
    pub fn finalize(&mut self) {
        let e2ee = self.e2ee;
        self.stage = match self.take_stage() {
            Stage::Staged(payload) => {
                debug!(kind = %self.kind, "Building staged sub-command");
                seal(derive_wire(self.kind, payload), e2ee)
            }
            Stage::SubBuilt(wire) => seal(wire, e2ee),
            sealed @ Stage::Sealed { .. } => sealed,
        };
    }

    fn take_stage(&mut self) -> Stage {
        std::mem::replace(
            &mut self.stage,
            Stage::Sealed {
                wire: CommandWire::default(),
                bytes: Vec::new(),
            },
        )
    }

    /// Encoded wire wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotBuilt`] before [`finalize`](Self::finalize).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.sealed_bytes().map(<[u8]>::to_vec)
    }

    /// Base64 of the encoded wire wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotBuilt`] before [`finalize`](Self::finalize).
    pub fn to_base64(&self) -> Result<String> {
        self.sealed_bytes().map(|bytes| BASE64.encode(bytes))
    }

    fn sealed_bytes(&self) -> Result<&[u8]> {
        match &self.stage {
            Stage::Sealed { bytes, .. } => Ok(bytes),
            _ => Err(ProtocolError::NotBuilt {
                stage: "wire wrapper",
            }),
        }
    }

    /// Request hash for integrity-sensitive commands.
    ///
    /// Absent when the command is not sealed yet or does not need one.
    pub fn request_integrity_token(&self, credentials: &dyn CredentialsProvider) -> Option<String> {
        if !self.is_wire_built() {
            warn!(kind = %self.kind, "Integrity token requested before command was built");
            return None;
        }
        if !self.integrity_sensitive {
            return None;
        }
        Some(ufsrv_crypto::integrity_token(
            credentials.account_id(),
            credentials.session_cookie(),
        ))
    }
}

fn derive_wire(kind: CommandKind, payload: Payload) -> CommandWire {
    let sub_header = payload_header(&payload);
    let header = CommandHeader {
        command: sub_header.map_or(0, |h| h.command),
        when: sub_header.map_or(0, |h| h.when),
        path: kind.server_path().unwrap_or_default().to_string(),
        ..Default::default()
    };

    CommandWire {
        header: Some(header),
        ufsrvtype: kind.wire_type().map_or(0, |t| t as i32),
        payload: Some(payload),
    }
}

fn seal(mut wire: CommandWire, e2ee: bool) -> Stage {
    wire.header.get_or_insert_with(CommandHeader::default).e2ee = Some(e2ee);
    let bytes = wire.encode_to_vec();
    Stage::Sealed { wire, bytes }
}

/// Whether the wrapper header declares end-to-end encryption.
pub fn declares_e2ee(wire: &CommandWire) -> bool {
    wire.header
        .as_ref()
        .and_then(|h| h.e2ee)
        .unwrap_or(false)
}

/// Check the exactly-one-payload discipline and return the command kind.
fn validate_wire(wire: &CommandWire) -> Result<CommandKind> {
    let payload = wire
        .payload
        .as_ref()
        .ok_or_else(|| ProtocolError::Decode("wire wrapper carries no sub-command".into()))?;
    let kind = payload_kind(payload);
    let tagged = CommandKind::from_wire_type(wire.ufsrvtype);
    if tagged != kind {
        return Err(ProtocolError::Decode(format!(
            "type tag {tagged} disagrees with {kind} payload"
        )));
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialsProvider;
    use crate::wire::{
        CallCommand, FenceCommand, FenceRecord, LocationCommand, MessageCommand, ReceiptCommand,
        StateCommand, SyncCommand, UfsrvType, UserCommand,
    };

    fn header(command: u32) -> Option<CommandHeader> {
        Some(CommandHeader {
            command,
            when: 1_700_000_000_000,
            ..Default::default()
        })
    }

    fn pointer(ufid: &str) -> AttachmentPointer {
        AttachmentPointer {
            ufid: ufid.into(),
            content_type: "image/png".into(),
            key: vec![1; 32],
            size: Some(10),
            ..Default::default()
        }
    }

    fn fence_builder() -> FenceCommand {
        FenceCommand {
            header: header(3),
            fences: vec![FenceRecord {
                fid: 77,
                fname: "climbers".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_from_built_derives_wire_immediately() {
        let command = Command::from_built(MessageCommand {
            header: header(1),
            ..Default::default()
        });

        assert!(command.is_sub_built());
        assert!(!command.is_wire_built());
        assert_eq!(command.kind(), CommandKind::Message);
        let wire = command.wire().unwrap();
        assert_eq!(wire.ufsrvtype, UfsrvType::Message as i32);
        assert_eq!(wire.header.as_ref().unwrap().path, "/V1/Message");
        assert_eq!(wire.header.as_ref().unwrap().command, 1);
    }

    #[test]
    fn test_from_builder_is_staged() {
        let command = Command::from_builder(fence_builder());

        assert!(!command.is_sub_built());
        assert!(!command.is_wire_built());
        assert!(command.wire().is_none());
        assert!(command.server_path().is_none());
    }

    #[test]
    fn test_defaults() {
        let command = Command::from_builder(StateCommand::default());

        assert!(command.is_e2ee());
        assert!(!command.is_integrity_sensitive());
        assert_eq!(command.transport_type(), TransportType::ApiService);
    }

    #[test]
    fn test_fence_builder_with_two_attachments() {
        let mut command = Command::from_builder(fence_builder());
        let added = command.include_attachments(&[pointer("a"), pointer("b")]);
        assert_eq!(added, 2);

        command.finalize();
        let bytes = command.to_bytes().unwrap();

        let decoded = CommandWire::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.ufsrvtype, UfsrvType::Fence as i32);
        match decoded.payload {
            Some(Payload::FenceCommand(fence)) => {
                assert_eq!(fence.attachments.len(), 2);
                assert_eq!(fence.attachments[0].id, "a");
                assert_eq!(fence.attachments[1].id, "b");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut command = Command::from_builder(fence_builder());
        command.include_attachments(&[pointer("a")]);

        command.finalize();
        let first = command.to_bytes().unwrap();
        let snapshot = command.clone();

        command.finalize();
        assert_eq!(command.to_bytes().unwrap(), first);
        assert_eq!(command, snapshot);
    }

    #[test]
    fn test_attachments_after_finalize_are_ignored() {
        let mut command = Command::from_builder(fence_builder());
        command.finalize();
        let before = command.to_bytes().unwrap();

        assert_eq!(command.include_attachments(&[pointer("late")]), 0);
        assert_eq!(command.to_bytes().unwrap(), before);
        assert_eq!(command.attachment_count(), 0);
    }

    #[test]
    fn test_attachments_on_built_sub_command_are_ignored() {
        let mut command = Command::from_built(fence_builder());
        assert_eq!(command.include_attachments(&[pointer("x")]), 0);
        assert_eq!(command.attachment_count(), 0);
    }

    #[test]
    fn test_attachments_ignored_for_other_kinds() {
        let mut command = Command::from_builder(CallCommand::default());
        assert_eq!(command.include_attachments(&[pointer("x")]), 0);
    }

    #[test]
    fn test_serialization_before_finalize_fails() {
        let command = Command::from_built(ReceiptCommand::default());

        assert!(matches!(
            command.to_bytes(),
            Err(ProtocolError::NotBuilt { .. })
        ));
        assert!(matches!(
            command.to_base64(),
            Err(ProtocolError::NotBuilt { .. })
        ));
    }

    #[test]
    fn test_to_base64_matches_bytes() {
        let mut command = Command::from_built(SyncCommand::default());
        command.finalize();

        let decoded = BASE64.decode(command.to_base64().unwrap()).unwrap();
        assert_eq!(decoded, command.to_bytes().unwrap());
    }

    #[test]
    fn test_exactly_one_payload_for_every_kind() {
        let mut commands = vec![
            Command::from_built(FenceCommand::default()),
            Command::from_built(MessageCommand::default()),
            Command::from_built(LocationCommand::default()),
            Command::from_built(UserCommand::default()),
            Command::from_built(CallCommand::default()),
            Command::from_built(ReceiptCommand::default()),
            Command::from_built(SyncCommand::default()),
            Command::from_built(StateCommand::default()),
        ];

        for command in &mut commands {
            command.finalize();
            let wire = CommandWire::decode(command.to_bytes().unwrap().as_slice()).unwrap();
            let payload = wire.payload.expect("one payload");
            assert_eq!(payload_kind(&payload), command.kind());
            assert_eq!(CommandKind::from_wire_type(wire.ufsrvtype), command.kind());
        }
    }

    #[test]
    fn test_sealed_header_declares_e2ee() {
        let mut plain = Command::from_built(MessageCommand::default()).with_e2ee(false);
        plain.finalize();
        assert!(!declares_e2ee(plain.wire().unwrap()));

        let mut secret = Command::from_built(MessageCommand::default());
        secret.finalize();
        assert!(declares_e2ee(secret.wire().unwrap()));
    }

    #[test]
    fn test_e2ee_frozen_after_seal() {
        let mut command = Command::from_built(MessageCommand::default());
        command.finalize();
        let command = command.with_e2ee(false);
        assert!(command.is_e2ee());
    }

    #[test]
    fn test_server_path_args() {
        let command = Command::from_built(StateCommand::default());
        assert_eq!(command.server_path(), Some("/V1/ActivityState"));
        assert_eq!(command.server_path_args().as_deref(), Some("/V1/ActivityState"));
    }

    #[test]
    fn test_integrity_token() {
        let credentials = StaticCredentialsProvider::new("1234", "cookie", None, 1);
        let mut command =
            Command::from_built(UserCommand::default()).with_integrity_sensitive(true);

        assert!(command.request_integrity_token(&credentials).is_none());

        command.finalize();
        assert_eq!(
            command.request_integrity_token(&credentials),
            Some(ufsrv_crypto::integrity_token("1234", "cookie"))
        );
    }

    #[test]
    fn test_integrity_token_absent_when_not_sensitive() {
        let credentials = StaticCredentialsProvider::new("1234", "cookie", None, 1);
        let mut command = Command::from_built(UserCommand::default());
        command.finalize();
        assert!(command.request_integrity_token(&credentials).is_none());
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let mut command = Command::from_built(CallCommand::default()).with_e2ee(false);
        command.finalize();

        let decoded = Command::from_bytes(&command.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.kind(), CommandKind::Call);
        assert!(decoded.is_wire_built());
        assert!(!decoded.is_e2ee());
        assert_eq!(decoded.to_bytes().unwrap(), command.to_bytes().unwrap());
    }

    #[test]
    fn test_from_wire_rejects_missing_payload() {
        let wire = CommandWire {
            header: None,
            ufsrvtype: UfsrvType::Fence as i32,
            payload: None,
        };
        assert!(matches!(
            Command::from_wire(wire),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_from_wire_rejects_mismatched_tag() {
        let wire = CommandWire {
            header: None,
            ufsrvtype: UfsrvType::Call as i32,
            payload: Some(Payload::MsgCommand(MessageCommand::default())),
        };
        assert!(matches!(
            Command::from_wire(wire),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Command::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
