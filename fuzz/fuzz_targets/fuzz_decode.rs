#![no_main]

use cubesat_comms::core::codec::{decode, KeyMap};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz frame decoding - any input must yield a result, never a panic
    let key_map = KeyMap::from_keys(["name", "uptime", "battery_level"]);
    if let Ok(frame) = decode(data, Some(&key_map)) {
        let _ = frame.to_map();
    }
});
