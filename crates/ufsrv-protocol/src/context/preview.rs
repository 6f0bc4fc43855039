//! Link previews carried by message commands.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentPointer;
use crate::command::Command;
use crate::wire::MessageCommand;
use crate::wire::command_wire::Payload;

/// A link preview.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    /// Previewed URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Preview image.
    pub image: Option<AttachmentPointer>,
}

impl LinkPreview {
    /// Previews of a message command, in order. Other kinds have none.
    pub fn from_command(command: &Command) -> Vec<Self> {
        match command.payload() {
            Some(Payload::MsgCommand(message)) => Self::from_message(message),
            _ => Vec::new(),
        }
    }

    /// Previews of `message`, in order.
    pub fn from_message(message: &MessageCommand) -> Vec<Self> {
        message
            .previews
            .iter()
            .map(|preview| Self {
                url: preview.url.clone(),
                title: preview.title.clone(),
                image: preview.image.as_ref().map(AttachmentPointer::from),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{AttachmentRecord, PreviewRecord};

    #[test]
    fn test_previews_keep_order_and_optional_image() {
        let message = MessageCommand {
            previews: vec![
                PreviewRecord {
                    url: "https://a.example".into(),
                    title: "A".into(),
                    image: Some(AttachmentRecord {
                        id: "img".into(),
                        ..Default::default()
                    }),
                },
                PreviewRecord {
                    url: "https://b.example".into(),
                    title: "B".into(),
                    image: None,
                },
            ],
            ..Default::default()
        };

        let previews = LinkPreview::from_command(&Command::from_built(message));
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].image.as_ref().unwrap().ufid, "img");
        assert_eq!(previews[1].url, "https://b.example");
        assert!(previews[1].image.is_none());
    }
}
