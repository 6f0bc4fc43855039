//! Quoted message carried by message commands.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentPointer;
use crate::command::Command;
use crate::wire::command_wire::Payload;
use crate::wire::{MessageCommand, QuotedAttachment};

/// Attachment referenced from a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAttachment {
    /// MIME type.
    pub content_type: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Thumbnail.
    pub thumbnail: Option<AttachmentPointer>,
}

impl From<&QuotedAttachment> for QuoteAttachment {
    fn from(attachment: &QuotedAttachment) -> Self {
        Self {
            content_type: attachment.content_type.clone(),
            file_name: attachment.file_name.clone(),
            thumbnail: attachment.thumbnail.as_ref().map(AttachmentPointer::from),
        }
    }
}

/// A quoted message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Timestamp id of the quoted message.
    pub id: u64,
    /// Author identifier.
    pub author: String,
    /// Quoted text.
    pub text: String,
    /// Quoted attachments.
    pub attachments: Vec<QuoteAttachment>,
}

impl Quote {
    /// Quote of a message command, if any.
    pub fn from_command(command: &Command) -> Option<Self> {
        match command.payload()? {
            Payload::MsgCommand(message) => Self::from_message(message),
            _ => None,
        }
    }

    /// Quote of `message`, if any.
    pub fn from_message(message: &MessageCommand) -> Option<Self> {
        let quoted = message.quoted_message.as_ref()?;
        Some(Self {
            id: quoted.id,
            author: quoted.author.clone(),
            text: quoted.text.clone(),
            attachments: quoted.attachments.iter().map(QuoteAttachment::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{AttachmentRecord, QuotedMessageRecord};

    #[test]
    fn test_quote_projection() {
        let message = MessageCommand {
            quoted_message: Some(QuotedMessageRecord {
                id: 1_650_000_000_123,
                author: "uid-ada".into(),
                text: "see you there".into(),
                attachments: vec![QuotedAttachment {
                    content_type: "image/jpeg".into(),
                    file_name: Some("map.jpg".into()),
                    thumbnail: Some(AttachmentRecord {
                        id: "thumb".into(),
                        width: 64,
                        ..Default::default()
                    }),
                }],
            }),
            ..Default::default()
        };

        let quote = Quote::from_message(&message).unwrap();
        assert_eq!(quote.id, 1_650_000_000_123);
        assert_eq!(quote.author, "uid-ada");
        assert_eq!(quote.attachments[0].file_name.as_deref(), Some("map.jpg"));
        assert_eq!(quote.attachments[0].thumbnail.as_ref().unwrap().width, 64);
    }

    #[test]
    fn test_no_quote() {
        assert!(Quote::from_message(&MessageCommand::default()).is_none());
    }
}
