//! Protocol-neutral views of a command's group and message fields.

pub mod group;
pub mod preview;
pub mod quote;

pub use group::{GroupContext, GroupContextType, RecipientResolver};
pub use preview::LinkPreview;
pub use quote::{Quote, QuoteAttachment};
