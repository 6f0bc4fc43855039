//! Fuzz target for sealed command decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ufsrv_protocol::Command;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut command) = Command::from_bytes(data) {
        assert!(command.is_wire_built());
        let bytes = command.to_bytes().unwrap();

        // Decoded commands are already sealed
        command.finalize();
        assert_eq!(command.to_bytes().unwrap(), bytes);
    }
});
