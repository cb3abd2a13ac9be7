#![no_main]

use cubesat_comms::protocol::command::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz command parsing with both argument splitting modes
    if let Ok(command) = Command::parse(data, None) {
        if let Ok(encoded) = command.encode(None) {
            let _ = Command::parse(&encoded, None);
        }
    }
    let _ = Command::parse(data, Some(","));
});
