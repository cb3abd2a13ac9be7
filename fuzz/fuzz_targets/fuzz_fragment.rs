#![no_main]

use cubesat_comms::core::packet::Fragment;
use cubesat_comms::protocol::reassembly::Reassembler;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input into packets and feed them through reassembly
    let mut reassembler = Reassembler::default();
    for packet in data.split(|&b| b == 0xff) {
        if let Ok(fragment) = Fragment::from_bytes(packet) {
            if !fragment.is_ack() {
                let _ = reassembler.accept(fragment);
            }
        }
    }
});
