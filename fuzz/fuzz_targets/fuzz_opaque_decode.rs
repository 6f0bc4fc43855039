//! Fuzz target for restoring persisted commands.
//!
//! Malformed blobs must be rejected without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ufsrv_protocol::Command;

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = Command::deserialize_opaque(data) {
        let blob = command.serialize_opaque().unwrap();
        let restored = Command::deserialize_opaque(&blob).unwrap();
        assert_eq!(restored.kind(), command.kind());
        assert_eq!(restored.is_e2ee(), command.is_e2ee());
    }
});
