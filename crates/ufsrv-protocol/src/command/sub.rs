//! Per-kind sub-command behaviour.
//!
//! Each of the eight sub-command messages implements [`SubCommand`] once:
//! its kind, how to reach its header and attachment slot, and how to place it
//! into the wire wrapper's oneof. Everything else in [`Command`](super::Command)
//! is written once against [`Payload`].

use prost::Message;

use super::kind::CommandKind;
use crate::wire::command_wire::Payload;
use crate::wire::{
    AttachmentRecord, CallCommand, CommandHeader, FenceCommand, LocationCommand, MessageCommand,
    ReceiptCommand, StateCommand, SyncCommand, UserCommand,
};

/// A sub-command message that can be carried by a command.
pub trait SubCommand: Message + Clone + Default + Sized + 'static {
    /// Kind of commands carrying this payload.
    const KIND: CommandKind;

    /// Sub-command header, if set.
    fn header(&self) -> Option<&CommandHeader>;

    /// Place this sub-command into the wrapper's oneof.
    fn into_payload(self) -> Payload;

    /// Server route, derived from [`Self::KIND`].
    fn server_path() -> Option<&'static str> {
        Self::KIND.server_path()
    }
}

macro_rules! impl_sub_command {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl SubCommand for $ty {
            const KIND: CommandKind = CommandKind::$kind;

            fn header(&self) -> Option<&CommandHeader> {
                self.header.as_ref()
            }

            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }
        }
    };
}

impl_sub_command!(FenceCommand, Fence, FenceCommand);
impl_sub_command!(MessageCommand, Message, MsgCommand);
impl_sub_command!(LocationCommand, Location, LocCommand);
impl_sub_command!(UserCommand, User, UserCommand);
impl_sub_command!(CallCommand, Call, CallCommand);
impl_sub_command!(ReceiptCommand, Receipt, ReceiptCommand);
impl_sub_command!(SyncCommand, Sync, SyncCommand);
impl_sub_command!(StateCommand, System, StateCommand);

/// Kind of the sub-command held in `payload`.
pub fn payload_kind(payload: &Payload) -> CommandKind {
    match payload {
        Payload::FenceCommand(_) => CommandKind::Fence,
        Payload::MsgCommand(_) => CommandKind::Message,
        Payload::LocCommand(_) => CommandKind::Location,
        Payload::UserCommand(_) => CommandKind::User,
        Payload::CallCommand(_) => CommandKind::Call,
        Payload::ReceiptCommand(_) => CommandKind::Receipt,
        Payload::SyncCommand(_) => CommandKind::Sync,
        Payload::StateCommand(_) => CommandKind::System,
    }
}

/// Header of the sub-command held in `payload`.
pub fn payload_header(payload: &Payload) -> Option<&CommandHeader> {
    match payload {
        Payload::FenceCommand(c) => c.header(),
        Payload::MsgCommand(c) => c.header(),
        Payload::LocCommand(c) => c.header(),
        Payload::UserCommand(c) => c.header(),
        Payload::CallCommand(c) => c.header(),
        Payload::ReceiptCommand(c) => c.header(),
        Payload::SyncCommand(c) => c.header(),
        Payload::StateCommand(c) => c.header(),
    }
}

/// Attachment list of the sub-command, for kinds that carry one.
pub fn payload_attachments(payload: &Payload) -> &[AttachmentRecord] {
    match payload {
        Payload::FenceCommand(c) => &c.attachments,
        Payload::MsgCommand(c) => &c.attachments,
        Payload::UserCommand(c) => &c.attachments,
        _ => &[],
    }
}

/// Mutable attachment list, for kinds that carry one.
pub fn payload_attachments_mut(payload: &mut Payload) -> Option<&mut Vec<AttachmentRecord>> {
    match payload {
        Payload::FenceCommand(c) => Some(&mut c.attachments),
        Payload::MsgCommand(c) => Some(&mut c.attachments),
        Payload::UserCommand(c) => Some(&mut c.attachments),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_match_payload_slots() {
        assert_eq!(
            payload_kind(&FenceCommand::default().into_payload()),
            FenceCommand::KIND
        );
        assert_eq!(
            payload_kind(&StateCommand::default().into_payload()),
            CommandKind::System
        );
        assert_eq!(MessageCommand::server_path(), Some("/V1/Message"));
    }

    #[test]
    fn test_attachment_slot_only_on_three_kinds() {
        let mut call = CallCommand::default().into_payload();
        assert!(payload_attachments_mut(&mut call).is_none());

        let mut user = UserCommand::default().into_payload();
        payload_attachments_mut(&mut user)
            .unwrap()
            .push(AttachmentRecord::default());
        assert_eq!(payload_attachments(&user).len(), 1);
    }
}
