//! Radio fragment format.
//!
//! Each radio packet carries one fragment of a larger message:
//!
//! ```text
//! [message_id(1)] [index(1)] [total(1)] [payload(N)]
//! ```
//!
//! `total == 0` is reserved for acknowledgements, which carry no payload and
//! reference the `message_id` whose final fragment arrived intact.

use crate::error::{constants, ProtocolError, Result};

/// Size of the fragment header in bytes.
pub const FRAGMENT_HEADER_SIZE: usize = 3;

/// Upper bound on fragments per message, set by the one-byte `total` field.
pub const MAX_FRAGMENTS: usize = u8::MAX as usize;

/// One radio packet's worth of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub message_id: u8,
    pub index: u8,
    pub total: u8,
    pub payload: Vec<u8>,
}

impl Fragment {
    /// Build the acknowledgement for `message_id`.
    pub fn ack(message_id: u8) -> Self {
        Self {
            message_id,
            index: 0,
            total: 0,
            payload: Vec::new(),
        }
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.total == 0
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        !self.is_ack() && u16::from(self.index) + 1 == u16::from(self.total)
    }

    pub fn encoded_len(&self) -> usize {
        FRAGMENT_HEADER_SIZE + self.payload.len()
    }

    /// Serialize to header + payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.push(self.message_id);
        bytes.push(self.index);
        bytes.push(self.total);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse and validate a raw packet.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAGMENT_HEADER_SIZE {
            return Err(ProtocolError::InvalidHeader);
        }
        let fragment = Self {
            message_id: bytes[0],
            index: bytes[1],
            total: bytes[2],
            payload: bytes[FRAGMENT_HEADER_SIZE..].to_vec(),
        };

        if fragment.is_ack() {
            if !fragment.payload.is_empty() || fragment.index != 0 {
                return Err(ProtocolError::MalformedFragment(constants::ERR_ACK_WITH_PAYLOAD));
            }
        } else if fragment.index >= fragment.total {
            return Err(ProtocolError::MalformedFragment(constants::ERR_INDEX_OUT_OF_RANGE));
        }
        Ok(fragment)
    }
}

/// Largest payload per fragment for a transport packet size.
pub fn chunk_size(max_packet_size: usize) -> Result<usize> {
    match max_packet_size.checked_sub(FRAGMENT_HEADER_SIZE) {
        Some(size) if size > 0 => Ok(size),
        _ => Err(ProtocolError::MalformedFragment(constants::ERR_PACKET_TOO_SMALL)),
    }
}

/// Number of fragments `len` bytes need; an empty message still takes one.
pub fn fragment_count(len: usize, max_packet_size: usize) -> Result<usize> {
    let chunk = chunk_size(max_packet_size)?;
    Ok(len.div_ceil(chunk).max(1))
}

/// Split `message` into fragments tagged with `message_id`.
///
/// Fails without producing anything if more than [`MAX_FRAGMENTS`] are needed.
pub fn fragment_message(message_id: u8, message: &[u8], max_packet_size: usize) -> Result<Vec<Fragment>> {
    let chunk = chunk_size(max_packet_size)?;
    let count = fragment_count(message.len(), max_packet_size)?;
    if count > MAX_FRAGMENTS {
        return Err(ProtocolError::OversizedMessage {
            len: message.len(),
            fragments: count,
        });
    }

    let total = count as u8;
    if message.is_empty() {
        return Ok(vec![Fragment {
            message_id,
            index: 0,
            total,
            payload: Vec::new(),
        }]);
    }

    Ok(message
        .chunks(chunk)
        .enumerate()
        .map(|(index, payload)| Fragment {
            message_id,
            index: index as u8,
            total,
            payload: payload.to_vec(),
        })
        .collect())
}
