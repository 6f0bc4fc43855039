//! Attachment pointer adapter.
//!
//! Application code describes uploaded attachments with the generic
//! [`AttachmentPointer`]. Fence, message and user commands carry them as
//! [`AttachmentRecord`]s. This module is the single place where the two
//! representations are converted, in both directions.

use serde::{Deserialize, Serialize};

use crate::wire::{ATTACHMENT_FLAG_VOICE_MESSAGE, AttachmentRecord};

/// Generic pointer to an uploaded attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPointer {
    /// Ufsrv file id.
    pub ufid: String,
    /// MIME type.
    pub content_type: String,
    /// Attachment encryption key.
    pub key: Vec<u8>,
    /// Plaintext size.
    pub size: Option<u32>,
    /// Inline thumbnail.
    pub thumbnail: Option<Vec<u8>>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Ciphertext digest.
    pub digest: Option<Vec<u8>>,
    /// Original file name.
    pub file_name: Option<String>,
    /// Whether this is a voice note.
    pub voice_note: bool,
    /// Caption.
    pub caption: Option<String>,
    /// Blur-hash placeholder.
    pub blur_hash: Option<String>,
}

impl From<&AttachmentPointer> for AttachmentRecord {
    fn from(pointer: &AttachmentPointer) -> Self {
        AttachmentRecord {
            id: pointer.ufid.clone(),
            content_type: pointer.content_type.clone(),
            key: pointer.key.clone(),
            size: pointer.size,
            thumbnail: pointer.thumbnail.clone(),
            digest: pointer.digest.clone(),
            file_name: pointer.file_name.clone(),
            flags: if pointer.voice_note {
                ATTACHMENT_FLAG_VOICE_MESSAGE
            } else {
                0
            },
            width: pointer.width,
            height: pointer.height,
            caption: pointer.caption.clone(),
            blur_hash: pointer.blur_hash.clone(),
        }
    }
}

impl From<&AttachmentRecord> for AttachmentPointer {
    fn from(record: &AttachmentRecord) -> Self {
        AttachmentPointer {
            ufid: record.id.clone(),
            content_type: record.content_type.clone(),
            key: record.key.clone(),
            size: record.size,
            thumbnail: record.thumbnail.clone(),
            width: record.width,
            height: record.height,
            digest: record.digest.clone(),
            file_name: record.file_name.clone(),
            voice_note: record.flags & ATTACHMENT_FLAG_VOICE_MESSAGE != 0,
            caption: record.caption.clone(),
            blur_hash: record.blur_hash.clone(),
        }
    }
}

/// Convert pointers into command attachment records, preserving order.
pub fn adapt_attachment_records(pointers: &[AttachmentPointer]) -> Vec<AttachmentRecord> {
    pointers.iter().map(AttachmentRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> AttachmentPointer {
        AttachmentPointer {
            ufid: "ufid-1".into(),
            content_type: "image/jpeg".into(),
            key: vec![9; 64],
            size: Some(2048),
            thumbnail: Some(vec![1, 2, 3]),
            width: 640,
            height: 480,
            digest: Some(vec![7; 32]),
            file_name: None,
            voice_note: false,
            caption: Some("sunset".into()),
            blur_hash: Some("LEHV6nWB2yk8".into()),
        }
    }

    #[test]
    fn test_record_preserves_fields() {
        let record = AttachmentRecord::from(&photo());

        assert_eq!(record.id, "ufid-1");
        assert_eq!(record.content_type, "image/jpeg");
        assert_eq!(record.size, Some(2048));
        assert_eq!((record.width, record.height), (640, 480));
        assert_eq!(record.digest.as_deref(), Some(&[7u8; 32][..]));
        assert_eq!(record.thumbnail.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(record.caption.as_deref(), Some("sunset"));
        assert_eq!(record.blur_hash.as_deref(), Some("LEHV6nWB2yk8"));
        assert_eq!(record.flags, 0);
    }

    #[test]
    fn test_optional_fields_stay_absent() {
        let pointer = AttachmentPointer {
            ufid: "x".into(),
            content_type: "audio/aac".into(),
            voice_note: true,
            ..Default::default()
        };
        let record = AttachmentRecord::from(&pointer);

        assert!(record.caption.is_none());
        assert!(record.blur_hash.is_none());
        assert!(record.digest.is_none());
        assert_eq!(record.flags, ATTACHMENT_FLAG_VOICE_MESSAGE);
        assert_eq!(AttachmentPointer::from(&record), pointer);
    }

    #[test]
    fn test_adapt_keeps_order() {
        let mut second = photo();
        second.ufid = "ufid-2".into();
        let records = adapt_attachment_records(&[photo(), second]);

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["ufid-1", "ufid-2"]);
    }
}
