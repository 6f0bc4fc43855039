//! Transport padding applied around session-encrypted bodies.
//!
//! Bodies are padded so their length is one less than a multiple of
//! [`TRANSPORT_PADDING_BLOCK`]: the payload, a [`TRANSPORT_PADDING_TERMINATOR`]
//! byte, then zeros.

use tracing::warn;

use crate::limits::{TRANSPORT_PADDING_BLOCK, TRANSPORT_PADDING_TERMINATOR};

fn padded_message_length(length: usize) -> usize {
    let with_terminator = length + 1;
    with_terminator.div_ceil(TRANSPORT_PADDING_BLOCK) * TRANSPORT_PADDING_BLOCK
}

/// Pad `body` for session encryption.
pub fn pad_message_body(body: &[u8]) -> Vec<u8> {
    let mut padded = vec![0u8; padded_message_length(body.len() + 1) - 1];
    padded[..body.len()].copy_from_slice(body);
    padded[body.len()] = TRANSPORT_PADDING_TERMINATOR;
    padded
}

/// Strip transport padding from a decrypted body.
///
/// Input without a well-formed padding tail is returned unchanged.
pub fn strip_message_padding(padded: &[u8]) -> Vec<u8> {
    for (index, &byte) in padded.iter().enumerate().rev() {
        if byte == TRANSPORT_PADDING_TERMINATOR {
            return padded[..index].to_vec();
        }
        if byte != 0x00 {
            warn!(len = padded.len(), "Malformed padding, returning body unstripped");
            return padded.to_vec();
        }
    }
    padded.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_lengths() {
        assert_eq!(pad_message_body(b"").len(), 159);
        assert_eq!(pad_message_body(&[1; 158]).len(), 159);
        assert_eq!(pad_message_body(&[1; 159]).len(), 319);
        assert_eq!(pad_message_body(&[1; 400]).len(), 479);
    }

    #[test]
    fn test_terminator_follows_body() {
        let padded = pad_message_body(b"hello");
        assert_eq!(&padded[..5], b"hello");
        assert_eq!(padded[5], TRANSPORT_PADDING_TERMINATOR);
        assert!(padded[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_strip_reverses_pad() {
        let body = b"\x80 body ending in terminator byte \x80".to_vec();
        assert_eq!(strip_message_padding(&pad_message_body(&body)), body);
    }

    #[test]
    fn test_strip_tolerates_unpadded_input() {
        assert_eq!(strip_message_padding(b"plain"), b"plain");
        assert_eq!(strip_message_padding(b""), b"");
    }

    #[test]
    fn test_strip_all_zero_input_unchanged() {
        assert_eq!(strip_message_padding(&[0, 0, 0]), vec![0, 0, 0]);
    }
}
