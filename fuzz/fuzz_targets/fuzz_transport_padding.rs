//! Fuzz target for transport padding.
//!
//! Stripping must accept arbitrary bytes, and padding must always strip back
//! to the original body.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ufsrv_protocol::limits::TRANSPORT_PADDING_BLOCK;
use ufsrv_protocol::{pad_message_body, strip_message_padding};

fuzz_target!(|data: &[u8]| {
    let stripped = strip_message_padding(data);
    assert!(stripped.len() <= data.len());

    let padded = pad_message_body(data);
    assert_eq!((padded.len() + 1) % TRANSPORT_PADDING_BLOCK, 0);
    assert!(padded.len() > data.len());
    assert_eq!(strip_message_padding(&padded), data);
});
