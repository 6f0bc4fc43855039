//! Protocol limits and constants.

/// Maximum accepted size of a serialized wire envelope (bytes).
pub const MAX_ENVELOPE_SIZE: usize = 256 * 1024;

/// Maximum accepted size of a serialized command wire wrapper (bytes).
pub const MAX_COMMAND_SIZE: usize = 192 * 1024;

/// Maximum accepted size of a persisted opaque command (bytes).
pub const MAX_OPAQUE_SIZE: usize = MAX_COMMAND_SIZE + 1024;

/// Block size used by transport padding.
pub const TRANSPORT_PADDING_BLOCK: usize = 160;

/// Byte terminating the payload inside a transport-padded body.
pub const TRANSPORT_PADDING_TERMINATOR: u8 = 0x80;

/// Leading byte of a plaintext-content body.
pub const PLAINTEXT_CONTENT_IDENTIFIER: u8 = 0xC0;

/// Current opaque command format version.
pub const OPAQUE_FORMAT_VERSION: u8 = 1;

/// Server route for fence commands.
pub const PATH_FENCE: &str = "/V1/Fence";

/// Server route for message commands.
pub const PATH_MESSAGE: &str = "/V1/Message";

/// Server route for location commands.
pub const PATH_LOCATION: &str = "/V1/Location";

/// Server route for user commands.
pub const PATH_USER: &str = "/V1/User";

/// Server route for call commands.
pub const PATH_CALL: &str = "/V1/Call";

/// Server route for receipt commands.
pub const PATH_RECEIPT: &str = "/V1/Receipt";

/// Server route for sync commands.
pub const PATH_SYNC: &str = "/V1/Sync";

/// Server route for activity-state commands.
pub const PATH_ACTIVITY_STATE: &str = "/V1/ActivityState";
