//! Command kinds and delivery channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::{
    PATH_ACTIVITY_STATE, PATH_CALL, PATH_FENCE, PATH_LOCATION, PATH_MESSAGE, PATH_RECEIPT,
    PATH_SYNC, PATH_USER,
};
use crate::wire::UfsrvType;

/// Application-level command kind.
///
/// Set once when a [`Command`](super::Command) is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Session control.
    Session,
    /// Fence (group) lifecycle.
    Fence,
    /// Message.
    Message,
    /// Location update.
    Location,
    /// User profile and preferences.
    User,
    /// Call signalling.
    Call,
    /// Receipt.
    Receipt,
    /// Multi-device sync.
    Sync,
    /// System activity state.
    System,
    /// Unrecognised wire type.
    Unknown,
}

impl CommandKind {
    /// All kinds that carry a sub-command payload.
    pub const WITH_PAYLOAD: [CommandKind; 8] = [
        Self::Fence,
        Self::Message,
        Self::Location,
        Self::User,
        Self::Call,
        Self::Receipt,
        Self::Sync,
        Self::System,
    ];

    /// Wire type tag for this kind. `Unknown` has none.
    pub fn wire_type(self) -> Option<UfsrvType> {
        match self {
            Self::Session => Some(UfsrvType::Session),
            Self::Fence => Some(UfsrvType::Fence),
            Self::Message => Some(UfsrvType::Message),
            Self::Location => Some(UfsrvType::Location),
            Self::User => Some(UfsrvType::User),
            Self::Call => Some(UfsrvType::Call),
            Self::Receipt => Some(UfsrvType::Receipt),
            Self::Sync => Some(UfsrvType::Sync),
            Self::System => Some(UfsrvType::State),
            Self::Unknown => None,
        }
    }

    /// Kind for a raw wire type tag; unrecognised tags map to `Unknown`.
    pub fn from_wire_type(tag: i32) -> Self {
        match UfsrvType::try_from(tag) {
            Ok(UfsrvType::Session) => Self::Session,
            Ok(UfsrvType::Fence) => Self::Fence,
            Ok(UfsrvType::Message) => Self::Message,
            Ok(UfsrvType::Location) => Self::Location,
            Ok(UfsrvType::User) => Self::User,
            Ok(UfsrvType::Call) => Self::Call,
            Ok(UfsrvType::Receipt) => Self::Receipt,
            Ok(UfsrvType::Sync) => Self::Sync,
            Ok(UfsrvType::State) => Self::System,
            Err(_) => Self::Unknown,
        }
    }

    /// Server route for commands of this kind.
    pub fn server_path(self) -> Option<&'static str> {
        match self {
            Self::Fence => Some(PATH_FENCE),
            Self::Message => Some(PATH_MESSAGE),
            Self::Location => Some(PATH_LOCATION),
            Self::User => Some(PATH_USER),
            Self::Call => Some(PATH_CALL),
            Self::Receipt => Some(PATH_RECEIPT),
            Self::Sync => Some(PATH_SYNC),
            Self::System => Some(PATH_ACTIVITY_STATE),
            Self::Session | Self::Unknown => None,
        }
    }

    /// Whether commands of this kind carry attachments.
    pub fn accepts_attachments(self) -> bool {
        matches!(self, Self::Fence | Self::Message | Self::User)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Delivery channel for a command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    /// Not chosen.
    Undefined,
    /// Persistent websocket pipe.
    LocalPipe,
    /// Request/response API.
    #[default]
    ApiService,
}
