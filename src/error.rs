//! # Error Types
//!
//! Error handling for the satellite communications stack.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias over
//! [`ProtocolError`]. Errors are grouped by the layer that detects them:
//!
//! ## Error Categories
//! - **Codec Errors**: buffer overruns, unknown type tags, oversized strings
//! - **Link Errors**: malformed fragment headers, oversized messages
//! - **Command Errors**: failed authentication, unknown commands, handler faults
//! - **Storage Errors**: persistent counter/flag storage unavailable (fatal at construction)
//! - **Ambient Errors**: configuration, key-map serialization
//!
//! Recoverable errors never cross the component that detected them: the
//! packet manager and the command handler log and drop. Only construction-time
//! storage failures are returned to the caller.
//!
//! ## Example Usage
//! ```rust
//! use cubesat_comms::core::codec::{decode, BinaryEncoder};
//! use cubesat_comms::error::ProtocolError;
//!
//! let mut encoder = BinaryEncoder::new();
//! encoder.add_int("battery_level", 85);
//! let mut bytes = encoder.to_bytes();
//! bytes.pop();
//!
//! match decode(&bytes, None) {
//!     Err(ProtocolError::BufferOverrun { .. }) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use thiserror::Error;

/// Static messages shared by log lines and error payloads.
pub mod constants {
    /// Link layer
    pub const ERR_NO_LICENSE: &str = "License is required to send data";
    pub const ERR_PACKET_TOO_SMALL: &str = "Transport packet size cannot hold a fragment header";
    pub const ERR_ACK_WITH_PAYLOAD: &str = "Acknowledgement carries a payload";
    pub const ERR_INDEX_OUT_OF_RANGE: &str = "Fragment index is not below fragment total";
    pub const ERR_TOTAL_MISMATCH: &str = "Fragment total differs from the buffered message";

    /// Command layer
    pub const ERR_NO_JOKES: &str = "No jokes configured";
    pub const ERR_NO_MODULATION: &str = "No modulation specified";
    pub const ERR_NO_REPEAT_MESSAGE: &str = "No message specified for repeat command";

    /// Storage
    pub const ERR_SLOT_OUT_OF_RANGE: &str = "NVM slot index outside of the store";
    pub const ERR_BIT_OUT_OF_RANGE: &str = "Flag bit index must be below 8";
}

// ProtocolError is the single error type for the crate
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Buffer overrun: needed {needed} bytes, {remaining} remaining")]
    BufferOverrun { needed: usize, remaining: usize },

    #[error("Unknown type tag: {0}")]
    UnknownTypeTag(u8),

    #[error("String field is not valid UTF-8")]
    InvalidUtf8,

    #[error("String too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("Unsupported integer width: {0} bytes")]
    InvalidIntWidth(u8),

    #[error("Integer {value} does not fit in {width} bytes")]
    IntOutOfRange { value: i128, width: u8 },

    #[error("Invalid fragment header")]
    InvalidHeader,

    #[error("Malformed fragment: {0}")]
    MalformedFragment(&'static str),

    #[error("Message of {len} bytes needs {fragments} fragments (max 255)")]
    OversizedMessage { len: usize, fragments: usize },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command handler failed: {0}")]
    Handler(String),

    #[error("Invalid modulation: {0}")]
    InvalidModulation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout occurred")]
    Timeout,
}

impl ProtocolError {
    /// Errors raised while parsing peer data; the offending bytes are dropped
    /// and logged as a warning rather than an error.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::BufferOverrun { .. }
                | ProtocolError::UnknownTypeTag(_)
                | ProtocolError::InvalidUtf8
                | ProtocolError::InvalidHeader
                | ProtocolError::MalformedFragment(_)
                | ProtocolError::OversizedMessage { .. }
                | ProtocolError::MissingField(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
