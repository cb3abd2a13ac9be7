//! # Core Wire Components
//!
//! Binary telemetry codec, key-map exchange and the radio fragment format.
//!
//! ## Components
//! - **Codec**: self-describing frames of hashed keys and typed values
//! - **Serialization**: out-of-band key map publication (bincode / JSON)
//! - **Packet**: fragment and acknowledgement headers
//!
//! ## Wire Format
//! ```text
//! Frame record: [key_hash(4)] [type_tag(1)] [value(N)]
//! Fragment:     [message_id(1)] [index(1)] [total(1)] [payload(N)]
//! Ack:          [message_id(1)] [0] [0]
//! ```
//!
//! ## Safety
//! - Every length/width is checked against the remaining buffer
//! - A message never needs more than 255 fragments

pub mod codec;
pub mod packet;
pub mod serialization;
