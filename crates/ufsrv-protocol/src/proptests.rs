//! Property-based tests for the command and envelope layers.
//!
//! They cover:
//!
//! - Transport padding (length shape, strip reverses pad)
//! - Finalize idempotence and exactly-one-payload for arbitrary headers
//! - Opaque persistence of arbitrary flag combinations
//! - Decoders never panicking on arbitrary input

use proptest::prelude::*;

use crate::limits::{TRANSPORT_PADDING_BLOCK, TRANSPORT_PADDING_TERMINATOR};
use crate::transport::{pad_message_body, strip_message_padding};
use crate::wire::command_wire::Payload;
use crate::wire::{
    CommandHeader, CommandWire, FenceCommand, MessageCommand, MessageRecord, ReceiptCommand,
};
use crate::{AttachmentPointer, Command, TransportType, WireEnvelope, payload_kind};

fn transport_type() -> impl Strategy<Value = TransportType> {
    prop_oneof![
        Just(TransportType::Undefined),
        Just(TransportType::LocalPipe),
        Just(TransportType::ApiService),
    ]
}

// ==================== Transport Padding ====================

proptest! {
    /// Padded length is one less than a block multiple and longer than the body.
    #[test]
    fn padded_length_shape(body in prop::collection::vec(any::<u8>(), 0..1024)) {
        let padded = pad_message_body(&body);
        prop_assert_eq!((padded.len() + 1) % TRANSPORT_PADDING_BLOCK, 0);
        prop_assert!(padded.len() > body.len());
        prop_assert_eq!(padded[body.len()], TRANSPORT_PADDING_TERMINATOR);
    }

    /// Stripping reverses padding for any body.
    #[test]
    fn strip_reverses_pad(body in prop::collection::vec(any::<u8>(), 0..1024)) {
        prop_assert_eq!(strip_message_padding(&pad_message_body(&body)), body);
    }

    /// Bodies ending in a byte other than the terminator or zero pass through.
    #[test]
    fn strip_passes_unpadded_through(
        mut body in prop::collection::vec(any::<u8>(), 0..256),
        last in 1u8..0x80,
    ) {
        body.push(last);
        prop_assert_eq!(strip_message_padding(&body), body);
    }
}

// ==================== Command Builder ====================

proptest! {
    /// Finalize twice yields byte-identical output with one payload.
    #[test]
    fn finalize_idempotent(
        verb in any::<u32>(),
        when in any::<u64>(),
        body in prop::collection::vec(any::<u8>(), 0..256),
        attachments in 0usize..4,
    ) {
        let builder = MessageCommand {
            header: Some(CommandHeader { command: verb, when, ..Default::default() }),
            messages: vec![MessageRecord { message: body }],
            ..Default::default()
        };
        let mut command = Command::from_builder(builder);
        let pointers = vec![AttachmentPointer::default(); attachments];
        prop_assert_eq!(command.include_attachments(&pointers), attachments);

        command.finalize();
        let first = command.to_bytes().unwrap();
        command.finalize();
        prop_assert_eq!(command.to_bytes().unwrap(), first.clone());

        let wire = command.wire().unwrap();
        prop_assert_eq!(wire.header.as_ref().unwrap().command, verb);
        prop_assert_eq!(wire.header.as_ref().unwrap().when, when);
        prop_assert_eq!(command.attachment_count(), attachments);
    }

    /// Opaque persistence keeps every flag combination.
    #[test]
    fn opaque_keeps_flags(
        e2ee in any::<bool>(),
        integrity in any::<bool>(),
        transport in transport_type(),
        seal in any::<bool>(),
        fid in any::<u64>(),
    ) {
        let receipt = ReceiptCommand { fid, ..Default::default() };
        let mut command = Command::from_built(receipt)
            .with_e2ee(e2ee)
            .with_integrity_sensitive(integrity)
            .with_transport(transport);
        if seal {
            command.finalize();
        }

        let restored = Command::deserialize_opaque(&command.serialize_opaque().unwrap()).unwrap();
        prop_assert_eq!(restored, command);
    }

    /// Any decodable wrapper is either adopted with a matching kind or rejected.
    #[test]
    fn from_wire_kind_matches_payload(tag in 0i32..12, fence in any::<bool>()) {
        let payload = if fence {
            Payload::FenceCommand(FenceCommand::default())
        } else {
            Payload::MsgCommand(MessageCommand::default())
        };
        let expected = payload_kind(&payload);
        let wire = CommandWire { header: None, ufsrvtype: tag, payload: Some(payload) };

        match Command::from_wire(wire) {
            Ok(command) => prop_assert_eq!(command.kind(), expected),
            Err(_) => prop_assert_ne!(crate::CommandKind::from_wire_type(tag), expected),
        }
    }
}

// ==================== Decoder Robustness ====================

proptest! {
    /// Arbitrary bytes never panic the envelope decoder.
    #[test]
    fn envelope_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = WireEnvelope::from_bytes(&bytes);
    }

    /// Arbitrary bytes never panic the command and opaque decoders.
    #[test]
    fn command_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Command::from_bytes(&bytes);
        let _ = Command::deserialize_opaque(&bytes);
    }
}
