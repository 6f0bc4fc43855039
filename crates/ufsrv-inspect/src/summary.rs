//! JSON-friendly views of envelopes and commands.

use serde::Serialize;
use ufsrv_protocol::{Command, CommandKind, EnvelopeBody, TransportType, WireEnvelope};

/// Summary of a decoded wire envelope.
#[derive(Debug, Serialize)]
pub struct EnvelopeSummary {
    pub envelope_type: String,
    pub type_code: i32,
    pub source_uuid: Option<String>,
    pub source_ufsrv_uid: Option<String>,
    pub source_device: u32,
    pub relay: Option<String>,
    pub timestamp: u64,
    pub server_timestamp: u64,
    pub server_delivered_timestamp: u64,
    pub server_guid: Option<String>,
    pub body: &'static str,
    pub body_len: usize,
    pub unidentified_sender: bool,
    pub embedded_kind: Option<CommandKind>,
    pub embedded_e2ee: Option<bool>,
    /// Set when the embedded command is delivered without a cipher: native
    /// pushes, and legacy bodies the sender declared unencrypted.
    pub unencrypted_needs_receipt: Option<bool>,
}

impl EnvelopeSummary {
    pub fn of(envelope: &WireEnvelope) -> Self {
        let (body, body_len) = match envelope.body() {
            EnvelopeBody::Legacy(bytes) => ("legacy", bytes.len()),
            EnvelopeBody::Content(bytes) => ("content", bytes.len()),
            EnvelopeBody::NativePush => ("native_push", 0),
            EnvelopeBody::Empty => ("empty", 0),
        };
        let unencrypted_needs_receipt = (envelope.is_native_push()
            || envelope.declares_legacy_bypass())
        .then(|| envelope.embedded_needs_receipt());

        Self {
            envelope_type: format!("{:?}", envelope.envelope_type()),
            type_code: envelope.type_code(),
            source_uuid: envelope.source().uuid().map(str::to_string),
            source_ufsrv_uid: envelope.source().ufsrv_uid().map(str::to_string),
            source_device: envelope.source_device(),
            relay: envelope.relay().map(str::to_string),
            timestamp: envelope.timestamp(),
            server_timestamp: envelope.server_timestamp(),
            server_delivered_timestamp: envelope.server_delivered_timestamp(),
            server_guid: envelope.server_guid().map(str::to_string),
            body,
            body_len,
            unidentified_sender: envelope.is_unidentified_sender(),
            embedded_kind: envelope.embedded_kind(),
            embedded_e2ee: envelope.embedded_declares_e2ee(),
            unencrypted_needs_receipt,
        }
    }
}

/// Summary of a command, either decoded from the wire or restored from
/// its opaque form.
#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub kind: CommandKind,
    pub e2ee: bool,
    pub transport: TransportType,
    pub integrity_sensitive: bool,
    pub wire_built: bool,
    pub server_path: Option<&'static str>,
    pub attachment_count: usize,
    pub header: Option<HeaderSummary>,
}

/// Selected header fields.
#[derive(Debug, Serialize)]
pub struct HeaderSummary {
    pub command: u32,
    pub args: u32,
    pub when: u64,
    pub uname: String,
    pub gid: u64,
    pub path: String,
    pub declared_e2ee: Option<bool>,
}

impl CommandSummary {
    pub fn of(command: &Command) -> Self {
        Self {
            kind: command.kind(),
            e2ee: command.is_e2ee(),
            transport: command.transport_type(),
            integrity_sensitive: command.is_integrity_sensitive(),
            wire_built: command.is_wire_built(),
            server_path: command.server_path(),
            attachment_count: command.attachment_count(),
            header: command.header().map(|h| HeaderSummary {
                command: h.command,
                args: h.args,
                when: h.when,
                uname: h.uname.clone(),
                gid: h.gid,
                path: h.path.clone(),
                declared_e2ee: h.e2ee,
            }),
        }
    }
}
