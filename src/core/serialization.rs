//! # Key Map Exchange Formats
//!
//! A satellite publishes the [`KeyMap`] of its beacon layout once, out-of-band,
//! so peers can decode its frames by name. This module serializes key maps in
//! one of two formats behind a one-byte format header.
//!
//! ## Formats
//! - **Bincode**: compact binary, suitable for sending over the radio itself
//! - **JSON**: human-readable, for ground tooling and mission archives
//!
//! ## Usage
//! ```rust
//! use cubesat_comms::core::codec::KeyMap;
//! use cubesat_comms::core::serialization::{export_key_map, import_key_map, KeyMapFormat};
//!
//! let key_map = KeyMap::from_keys(["battery_level", "uptime"]);
//! let bytes = export_key_map(&key_map, KeyMapFormat::Bincode).unwrap();
//! let (restored, format) = import_key_map(&bytes).unwrap();
//! assert_eq!(restored, key_map);
//! assert_eq!(format, KeyMapFormat::Bincode);
//! ```

use crate::core::codec::KeyMap;
use crate::error::{ProtocolError, Result};

/// Supported key map serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMapFormat {
    /// Binary compact format (default)
    #[default]
    Bincode,
    /// Human-readable JSON format
    Json,
}

impl KeyMapFormat {
    /// Get the format identifier byte for the wire
    pub fn format_byte(self) -> u8 {
        match self {
            KeyMapFormat::Bincode => 0x01,
            KeyMapFormat::Json => 0x02,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(KeyMapFormat::Bincode),
            0x02 => Some(KeyMapFormat::Json),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            KeyMapFormat::Bincode => "Bincode",
            KeyMapFormat::Json => "JSON",
        }
    }
}

/// Serialize a key map with its format header.
pub fn export_key_map(key_map: &KeyMap, format: KeyMapFormat) -> Result<Vec<u8>> {
    let mut data = vec![format.format_byte()];
    let mut payload = match format {
        KeyMapFormat::Bincode => bincode::serialize(key_map)?,
        KeyMapFormat::Json => serde_json::to_vec(key_map)?,
    };
    data.append(&mut payload);
    Ok(data)
}

/// Deserialize a key map exported by [`export_key_map`].
pub fn import_key_map(data: &[u8]) -> Result<(KeyMap, KeyMapFormat)> {
    let (&first, payload) = data
        .split_first()
        .ok_or_else(|| ProtocolError::DeserializeError("Empty data".to_string()))?;

    let format = KeyMapFormat::from_byte(first)
        .ok_or_else(|| ProtocolError::DeserializeError(format!("Unknown format byte: {first}")))?;

    let key_map = match format {
        KeyMapFormat::Bincode => bincode::deserialize(payload)?,
        KeyMapFormat::Json => serde_json::from_slice(payload)?,
    };
    Ok((key_map, format))
}
