//! Property-based tests using proptest
//!
//! These tests validate codec and link invariants across a wide range of
//! randomly generated inputs: values survive encoding, fragments reassemble in
//! any order, and arbitrary bytes never cause a panic.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cubesat_comms::core::codec::{decode, BinaryEncoder, KeyMap, MAX_STRING_LENGTH};
use cubesat_comms::core::packet::{fragment_message, Fragment, FRAGMENT_HEADER_SIZE, MAX_FRAGMENTS};
use cubesat_comms::protocol::command::Command;
use cubesat_comms::protocol::reassembly::{Reassembler, Reassembly};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// Property: any i64 survives the narrowest-width encoding
proptest! {
    #[test]
    fn prop_int_roundtrip(value in any::<i64>()) {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("value", value);
        let frame = decode(&encoder.to_bytes(), None).expect("decode");
        prop_assert_eq!(frame.get_int("value"), Some(value));
    }
}

// Property: any u64 survives, including values above i64::MAX
proptest! {
    #[test]
    fn prop_uint_roundtrip(value in any::<u64>()) {
        let mut encoder = BinaryEncoder::new();
        encoder.add_uint("value", value);
        let frame = decode(&encoder.to_bytes(), None).expect("decode");
        prop_assert_eq!(frame.get_uint("value"), Some(value));
    }
}

// Property: the auto-selected width is never wider than needed
proptest! {
    #[test]
    fn prop_small_ints_stay_small(value in -128i64..=255) {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("v", value);
        prop_assert_eq!(encoder.to_bytes().len(), 6);
    }
}

// Property: doubles are exact, floats within single precision
proptest! {
    #[test]
    fn prop_float_roundtrip(value in -1.0e6f64..1.0e6) {
        let mut encoder = BinaryEncoder::new();
        encoder.add_double("double", value);
        encoder.add_float("single", value);
        let frame = decode(&encoder.to_bytes(), None).expect("decode");

        prop_assert_eq!(frame.get_float("double"), Some(value));
        let single = frame.get_float("single").expect("single");
        prop_assert!((single - value).abs() <= value.abs() * 1e-6 + 1e-6);
    }
}

// Property: strings up to the length limit round-trip with their names
proptest! {
    #[test]
    fn prop_string_roundtrip(key in "[a-z_]{1,16}", value in "\\PC{0,60}") {
        prop_assume!(value.len() <= MAX_STRING_LENGTH);
        let mut encoder = BinaryEncoder::new();
        encoder.add_string(&key, &value).expect("within limit");

        let key_map = KeyMap::from_keys([key.as_str()]);
        let map = decode(&encoder.to_bytes(), Some(&key_map)).expect("decode").to_map();
        prop_assert_eq!(map.get(&key).and_then(|v| v.as_str()), Some(value.as_str()));
    }
}

// Property: decoding arbitrary bytes returns a result, never panics
proptest! {
    #[test]
    fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&data, None);
    }
}

// Property: parsing arbitrary packets as fragments never panics
proptest! {
    #[test]
    fn prop_fragment_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
        if let Ok(fragment) = Fragment::from_bytes(&data) {
            prop_assert_eq!(fragment.to_bytes(), data);
        }
    }
}

// Property: fragments respect the packet size and reassemble in order
proptest! {
    #[test]
    fn prop_fragment_reassemble_in_order(
        message in prop::collection::vec(any::<u8>(), 0..2000),
        mtu in (FRAGMENT_HEADER_SIZE + 1)..256usize,
        message_id in any::<u8>(),
    ) {
        let chunk = mtu - FRAGMENT_HEADER_SIZE;
        prop_assume!(message.len().div_ceil(chunk) <= MAX_FRAGMENTS);

        let fragments = fragment_message(message_id, &message, mtu).expect("fits");
        prop_assert!(fragments.iter().all(|f| f.encoded_len() <= mtu));
        prop_assert!(fragments.iter().all(|f| usize::from(f.total) == fragments.len()));

        let mut reassembler = Reassembler::default();
        let mut result = None;
        for fragment in fragments {
            if let Reassembly::Complete { payload, .. } = reassembler.accept(fragment).expect("valid") {
                result = Some(payload);
            }
        }
        prop_assert_eq!(result, Some(message));
    }
}

// Property: arrival order does not matter, and duplicates are ignored
proptest! {
    #[test]
    fn prop_fragment_reassemble_permuted(
        message in prop::collection::vec(any::<u8>(), 1..600),
        seed in any::<u64>(),
    ) {
        let mut fragments = fragment_message(9, &message, 32).expect("fits");
        let len = fragments.len();

        fragments.shuffle(&mut StdRng::seed_from_u64(seed));
        let duplicate = fragments[0].clone();

        let mut reassembler = Reassembler::default();
        let mut result = None;
        for (position, fragment) in fragments.into_iter().enumerate() {
            let outcome = reassembler.accept(fragment).expect("valid");
            if position == 0 && len > 1 {
                prop_assert_eq!(
                    reassembler.accept(duplicate.clone()).expect("valid"),
                    Reassembly::Duplicate
                );
            }
            if let Reassembly::Complete { payload, message_id } = outcome {
                prop_assert_eq!(message_id, 9);
                result = Some(payload);
            }
        }
        prop_assert_eq!(result, Some(message));
    }
}

// Property: command frames round-trip for whitespace-free arguments
proptest! {
    #[test]
    fn prop_command_roundtrip(
        name in "[a-z_]{1,24}",
        credential in "[A-Za-z0-9!]{1,16}",
        args in prop::collection::vec("[A-Za-z0-9.]{1,12}", 0..5),
    ) {
        let command = Command::new(name, credential).with_args(args);
        let bytes = command.encode(None).expect("encode");
        prop_assert_eq!(Command::parse(&bytes, None).expect("parse"), command);
    }
}

// Property: parsing arbitrary bytes as a command never panics
proptest! {
    #[test]
    fn prop_command_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Command::parse(&data, None);
        let _ = Command::parse(&data, Some(","));
    }
}
