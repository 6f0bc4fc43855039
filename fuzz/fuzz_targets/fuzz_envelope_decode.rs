//! Fuzz target for wire envelope decoding.
//!
//! Arbitrary bytes either fail to decode or yield an envelope whose raw
//! form validates back to the same value.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ufsrv_protocol::WireEnvelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = WireEnvelope::from_bytes(data) {
        let _ = envelope.embedded_kind();
        let _ = envelope.is_receipt();
        let roundtrip = WireEnvelope::from_proto(envelope.to_proto()).unwrap();
        assert_eq!(envelope, roundtrip);
    }
});
