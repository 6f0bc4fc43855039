//! Group context projected from fence and message commands.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentPointer;
use crate::command::Command;
use crate::wire::command_wire::Payload;
use crate::wire::{FenceCommand, MessageCommand, UserRecord};

/// Maps command identifiers to application-level handles.
///
/// Implemented by the application's recipient and group databases.
pub trait RecipientResolver {
    /// Application recipient handle.
    type Recipient;

    /// Local group id for a fence, if the fence is known.
    fn group_id(&self, fid: u64) -> Option<Vec<u8>>;

    /// Recipient for a user reference, if the user is known.
    fn recipient(&self, user: &UserRecord) -> Option<Self::Recipient>;
}

/// Kind of group context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupContextType {
    /// Unrecognised.
    Unknown,
    /// Group created or changed.
    Update,
    /// Message delivered to an existing group.
    Deliver,
    /// Sender left the group.
    Quit,
    /// Sender asked for group details.
    RequestInfo,
    /// Fence state carried by a ufsrv fence command.
    Ufsrv,
}

/// Group information attached to a received command.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupContext<R> {
    /// Kind of context.
    pub context_type: GroupContextType,
    /// Local group id; absent when the fence is not known locally.
    pub group_id: Option<Vec<u8>>,
    /// Fence id.
    pub fid: Option<u64>,
    /// Display name.
    pub name: Option<String>,
    /// Resolved members. Unknown users are skipped.
    pub members: Vec<R>,
    /// Group avatar.
    pub avatar: Option<AttachmentPointer>,
}

impl<R> GroupContext<R> {
    /// Project the group context of `command`.
    ///
    /// Fence commands yield a [`GroupContextType::Ufsrv`] context built from
    /// the first fence record. Message commands addressed to a fence yield a
    /// [`GroupContextType::Deliver`] context. Other kinds have none.
    pub fn from_command<G>(command: &Command, resolver: &G) -> Option<Self>
    where
        G: RecipientResolver<Recipient = R>,
    {
        match command.payload()? {
            Payload::FenceCommand(fence) => Some(Self::from_fence(fence, resolver)),
            Payload::MsgCommand(message) => Self::from_message(message, resolver),
            _ => None,
        }
    }

    /// Context of a fence command.
    pub fn from_fence<G>(fence: &FenceCommand, resolver: &G) -> Self
    where
        G: RecipientResolver<Recipient = R>,
    {
        let Some(record) = fence.fences.first() else {
            return Self::deliver(None, None);
        };

        Self {
            context_type: GroupContextType::Ufsrv,
            group_id: resolver.group_id(record.fid),
            fid: Some(record.fid),
            name: Some(record.fname.clone()).filter(|name| !name.is_empty()),
            members: record
                .members
                .iter()
                .filter_map(|user| resolver.recipient(user))
                .collect(),
            avatar: record.avatar.as_ref().map(AttachmentPointer::from),
        }
    }

    /// Context of a message command, when it is addressed to a fence.
    pub fn from_message<G>(message: &MessageCommand, resolver: &G) -> Option<Self>
    where
        G: RecipientResolver<Recipient = R>,
    {
        let record = message.fences.first()?;
        Some(Self::deliver(resolver.group_id(record.fid), Some(record.fid)))
    }

    fn deliver(group_id: Option<Vec<u8>>, fid: Option<u64>) -> Self {
        Self {
            context_type: GroupContextType::Deliver,
            group_id,
            fid,
            name: None,
            members: Vec::new(),
            avatar: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::wire::{AttachmentRecord, CallCommand, FenceRecord};

    struct Directory {
        groups: HashMap<u64, Vec<u8>>,
        users: HashMap<String, u32>,
    }

    impl RecipientResolver for Directory {
        type Recipient = u32;

        fn group_id(&self, fid: u64) -> Option<Vec<u8>> {
            self.groups.get(&fid).cloned()
        }

        fn recipient(&self, user: &UserRecord) -> Option<u32> {
            self.users.get(&user.username).copied()
        }
    }

    fn directory() -> Directory {
        Directory {
            groups: HashMap::from([(10, b"group-10".to_vec())]),
            users: HashMap::from([("ada".to_string(), 1), ("bea".to_string(), 2)]),
        }
    }

    fn user(name: &str) -> UserRecord {
        UserRecord {
            ufsrvuid: name.as_bytes().to_vec(),
            username: name.into(),
        }
    }

    #[test]
    fn test_fence_context() {
        let fence = FenceCommand {
            fences: vec![FenceRecord {
                fid: 10,
                fname: "Hikers".into(),
                avatar: Some(AttachmentRecord {
                    id: "avatar-ufid".into(),
                    content_type: "image/png".into(),
                    ..Default::default()
                }),
                members: vec![user("ada"), user("zed"), user("bea")],
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut command = Command::from_built(fence);
        command.finalize();

        let context = GroupContext::from_command(&command, &directory()).unwrap();
        assert_eq!(context.context_type, GroupContextType::Ufsrv);
        assert_eq!(context.group_id.as_deref(), Some(&b"group-10"[..]));
        assert_eq!(context.name.as_deref(), Some("Hikers"));
        assert_eq!(context.members, vec![1, 2]);
        assert_eq!(context.avatar.unwrap().ufid, "avatar-ufid");
    }

    #[test]
    fn test_fence_without_records_is_bare_deliver() {
        let context: GroupContext<u32> =
            GroupContext::from_fence(&FenceCommand::default(), &directory());
        assert_eq!(context.context_type, GroupContextType::Deliver);
        assert!(context.group_id.is_none());
    }

    #[test]
    fn test_message_to_unknown_fence() {
        let message = MessageCommand {
            fences: vec![FenceRecord {
                fid: 99,
                ..Default::default()
            }],
            ..Default::default()
        };
        let context = GroupContext::from_message(&message, &directory()).unwrap();
        assert_eq!(context.context_type, GroupContextType::Deliver);
        assert_eq!(context.fid, Some(99));
        assert!(context.group_id.is_none());
    }

    #[test]
    fn test_other_kinds_have_no_context() {
        let command = Command::from_built(CallCommand::default());
        assert!(GroupContext::from_command(&command, &directory()).is_none());
        assert!(GroupContext::from_message(&MessageCommand::default(), &directory()).is_none());
    }
}
