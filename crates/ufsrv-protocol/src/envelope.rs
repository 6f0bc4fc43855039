//! Validated view of a received wire envelope.
//!
//! [`WireEnvelope`] is built from the raw [`Envelope`] protobuf and enforces
//! the body shape: exactly one of a legacy message, a content body, or a
//! native push (no body, embedded command present). A server receipt may
//! carry no body at all.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost::Message;
use ufsrv_crypto::ServiceAddress;

use crate::command::CommandKind;
use crate::limits::MAX_ENVELOPE_SIZE;
use crate::wire::{CommandWire, Envelope, EnvelopeType};
use crate::{ProtocolError, Result};

/// Body carried by an envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum EnvelopeBody {
    /// Legacy message slot.
    Legacy(Vec<u8>),
    /// Content slot.
    Content(Vec<u8>),
    /// No body; the embedded command is the payload.
    NativePush,
    /// No body and no command. Only valid on server receipts.
    Empty,
}

/// A received envelope whose shape has been validated.
#[derive(Clone, Debug, PartialEq)]
pub struct WireEnvelope {
    type_code: i32,
    source: ServiceAddress,
    source_device: u32,
    relay: Option<String>,
    timestamp: u64,
    server_timestamp: u64,
    server_delivered_timestamp: u64,
    server_guid: Option<String>,
    body: EnvelopeBody,
    embedded_command: Option<CommandWire>,
}

impl WireEnvelope {
    /// Start building an envelope.
    pub fn builder(envelope_type: EnvelopeType) -> WireEnvelopeBuilder {
        WireEnvelopeBuilder::new(envelope_type)
    }

    /// Decode and validate serialized envelope bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::TooLarge`] above [`MAX_ENVELOPE_SIZE`]
    /// - [`ProtocolError::Decode`] for malformed protobuf
    /// - [`ProtocolError::InvalidEnvelope`] for a bad body shape
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(ProtocolError::TooLarge {
                what: "envelope",
                actual: bytes.len(),
                max: MAX_ENVELOPE_SIZE,
            });
        }
        let raw = Envelope::decode(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Self::from_proto(raw)
    }

    /// Decode a base64 envelope.
    ///
    /// # Errors
    ///
    /// Same as [`from_bytes`](Self::from_bytes), plus [`ProtocolError::Decode`]
    /// for invalid base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Validate a raw envelope.
    ///
    /// The e164 source is used as the ufsrv uid when no uid is present.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidEnvelope`] for a bad body shape.
    pub fn from_proto(raw: Envelope) -> Result<Self> {
        let type_code = raw.r#type.unwrap_or(EnvelopeType::Unknown as i32);
        let body = body_shape(
            type_code,
            raw.legacy_message,
            raw.content,
            raw.ufsrv_command.is_some(),
        )?;

        Ok(Self {
            type_code,
            source: ServiceAddress::new(
                raw.source_uuid,
                raw.source_ufsrv_uid.or(raw.source_e164),
            ),
            source_device: raw.source_device.unwrap_or_default(),
            relay: raw.relay,
            timestamp: raw.timestamp.unwrap_or_default(),
            server_timestamp: raw.server_timestamp.unwrap_or_default(),
            server_delivered_timestamp: raw.server_delivered_timestamp.unwrap_or_default(),
            server_guid: raw.server_guid,
            body,
            embedded_command: raw.ufsrv_command,
        })
    }

    /// Raw protobuf form.
    pub fn to_proto(&self) -> Envelope {
        let (legacy_message, content) = match &self.body {
            EnvelopeBody::Legacy(bytes) => (Some(bytes.clone()), None),
            EnvelopeBody::Content(bytes) => (None, Some(bytes.clone())),
            EnvelopeBody::NativePush | EnvelopeBody::Empty => (None, None),
        };

        Envelope {
            r#type: Some(self.type_code),
            source_e164: None,
            relay: self.relay.clone(),
            timestamp: Some(self.timestamp),
            legacy_message,
            source_device: Some(self.source_device),
            content,
            server_guid: self.server_guid.clone(),
            server_timestamp: Some(self.server_timestamp),
            source_uuid: self.source.uuid().map(str::to_string),
            ufsrv_command: self.embedded_command.clone(),
            source_ufsrv_uid: self.source.ufsrv_uid().map(str::to_string),
            server_delivered_timestamp: Some(self.server_delivered_timestamp),
        }
    }

    /// Serialized protobuf.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    /// Base64 of the serialized protobuf.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    /// Envelope type; unrecognised codes map to [`EnvelopeType::Unknown`].
    pub fn envelope_type(&self) -> EnvelopeType {
        EnvelopeType::try_from(self.type_code).unwrap_or(EnvelopeType::Unknown)
    }

    /// Raw type code as received.
    pub fn type_code(&self) -> i32 {
        self.type_code
    }

    /// Claimed source.
    pub fn source(&self) -> &ServiceAddress {
        &self.source
    }

    /// Source device id.
    pub fn source_device(&self) -> u32 {
        self.source_device
    }

    /// Relay name.
    pub fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    /// Client timestamp in milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Server receive timestamp in milliseconds.
    pub fn server_timestamp(&self) -> u64 {
        self.server_timestamp
    }

    /// Server delivery timestamp in milliseconds.
    pub fn server_delivered_timestamp(&self) -> u64 {
        self.server_delivered_timestamp
    }

    /// Server-assigned guid.
    pub fn server_guid(&self) -> Option<&str> {
        self.server_guid.as_deref()
    }

    /// Body.
    pub fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// Embedded command wrapper.
    pub fn embedded_command(&self) -> Option<&CommandWire> {
        self.embedded_command.as_ref()
    }

    /// Kind of the embedded command.
    pub fn embedded_kind(&self) -> Option<CommandKind> {
        self.embedded_command
            .as_ref()
            .map(|wire| CommandKind::from_wire_type(wire.ufsrvtype))
    }

    /// Whether the embedded command header declares end-to-end encryption.
    ///
    /// Absent when there is no embedded command or the header is silent.
    pub fn embedded_declares_e2ee(&self) -> Option<bool> {
        self.embedded_command.as_ref()?.header.as_ref()?.e2ee
    }

    /// Whether the legacy body rides in the clear by the embedded command's
    /// own declaration: a legacy slot plus a command whose header does not
    /// declare end-to-end encryption.
    pub fn declares_legacy_bypass(&self) -> bool {
        matches!(self.body, EnvelopeBody::Legacy(_))
            && self.embedded_command.is_some()
            && self.embedded_declares_e2ee() != Some(true)
    }

    /// Receipt decision for an embedded command delivered without a cipher.
    ///
    /// Native pushes and bypassed legacy bodies carry no sealed-sender
    /// metadata, so only message commands ask for a delivery receipt.
    pub fn embedded_needs_receipt(&self) -> bool {
        self.embedded_kind() == Some(CommandKind::Message)
    }

    /// Whether the envelope names its source.
    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }

    /// Whether the source carries a service uuid.
    pub fn has_source_uuid(&self) -> bool {
        self.source.uuid().is_some()
    }

    /// Whether the legacy slot is populated.
    pub fn has_legacy_message(&self) -> bool {
        matches!(self.body, EnvelopeBody::Legacy(_))
    }

    /// Whether the content slot is populated.
    pub fn has_content(&self) -> bool {
        matches!(self.body, EnvelopeBody::Content(_))
    }

    /// Whether the embedded command is the whole payload.
    pub fn is_native_push(&self) -> bool {
        matches!(self.body, EnvelopeBody::NativePush)
    }

    /// Sealed-sender envelope.
    pub fn is_unidentified_sender(&self) -> bool {
        self.type_code == EnvelopeType::UnidentifiedSender as i32
    }

    /// Session ciphertext with pre-key handshake.
    pub fn is_prekey_bundle(&self) -> bool {
        self.type_code == EnvelopeType::PrekeyBundle as i32
    }

    /// Session ciphertext.
    pub fn is_signal_message(&self) -> bool {
        self.type_code == EnvelopeType::Ciphertext as i32
    }

    /// Plaintext control content.
    pub fn is_plaintext_content(&self) -> bool {
        self.type_code == EnvelopeType::PlaintextContent as i32
    }

    /// Server receipt.
    pub fn is_receipt(&self) -> bool {
        self.type_code == EnvelopeType::Receipt as i32
    }
}

fn body_shape(
    type_code: i32,
    legacy: Option<Vec<u8>>,
    content: Option<Vec<u8>>,
    has_command: bool,
) -> Result<EnvelopeBody> {
    match (legacy, content) {
        (Some(_), Some(_)) => Err(ProtocolError::InvalidEnvelope(
            "both legacy message and content present".into(),
        )),
        (Some(legacy), None) => Ok(EnvelopeBody::Legacy(legacy)),
        (None, Some(content)) => Ok(EnvelopeBody::Content(content)),
        (None, None) if has_command => Ok(EnvelopeBody::NativePush),
        (None, None) if type_code == EnvelopeType::Receipt as i32 => Ok(EnvelopeBody::Empty),
        (None, None) => Err(ProtocolError::InvalidEnvelope(
            "no body and no embedded command".into(),
        )),
    }
}

/// Builder for [`WireEnvelope`].
#[derive(Clone, Debug)]
pub struct WireEnvelopeBuilder {
    raw: Envelope,
}

impl WireEnvelopeBuilder {
    fn new(envelope_type: EnvelopeType) -> Self {
        Self {
            raw: Envelope {
                r#type: Some(envelope_type as i32),
                ..Default::default()
            },
        }
    }

    /// Set the source.
    pub fn source(mut self, source: &ServiceAddress) -> Self {
        self.raw.source_uuid = source.uuid().map(str::to_string);
        self.raw.source_ufsrv_uid = source.ufsrv_uid().map(str::to_string);
        self
    }

    /// Set the source device.
    pub fn source_device(mut self, device_id: u32) -> Self {
        self.raw.source_device = Some(device_id);
        self
    }

    /// Set the client timestamp.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.raw.timestamp = Some(timestamp);
        self
    }

    /// Set the server receive timestamp.
    pub fn server_timestamp(mut self, timestamp: u64) -> Self {
        self.raw.server_timestamp = Some(timestamp);
        self
    }

    /// Set the server delivery timestamp.
    pub fn server_delivered_timestamp(mut self, timestamp: u64) -> Self {
        self.raw.server_delivered_timestamp = Some(timestamp);
        self
    }

    /// Set the server guid.
    pub fn server_guid(mut self, guid: impl Into<String>) -> Self {
        self.raw.server_guid = Some(guid.into());
        self
    }

    /// Put `body` in the legacy slot.
    pub fn legacy_message(mut self, body: Vec<u8>) -> Self {
        self.raw.legacy_message = Some(body);
        self
    }

    /// Put `body` in the content slot.
    pub fn content(mut self, body: Vec<u8>) -> Self {
        self.raw.content = Some(body);
        self
    }

    /// Embed a command wrapper.
    pub fn embedded_command(mut self, wire: CommandWire) -> Self {
        self.raw.ufsrv_command = Some(wire);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidEnvelope`] for a bad body shape.
    pub fn build(self) -> Result<WireEnvelope> {
        WireEnvelope::from_proto(self.raw)
    }
}
