//! Fragment reassembly.
//!
//! Holds at most one partially received message. Fragments may arrive out of
//! order; duplicates are ignored. The buffer is dropped when the message
//! completes, when a fragment of a different message arrives, or when it has
//! been idle for longer than the optional timeout.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::packet::Fragment;
use crate::error::{constants, ProtocolError, Result};

/// Result of feeding one fragment to the [`Reassembler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    /// Buffered; more fragments needed.
    Pending,
    /// This index was already held.
    Duplicate,
    /// Every fragment is present; payloads concatenated in index order.
    Complete { message_id: u8, payload: Vec<u8> },
}

#[derive(Debug)]
struct PartialMessage {
    message_id: u8,
    total: u8,
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
    last_activity: Instant,
}

impl PartialMessage {
    fn new(message_id: u8, total: u8) -> Self {
        Self {
            message_id,
            total,
            parts: vec![None; usize::from(total)],
            received: 0,
            last_activity: Instant::now(),
        }
    }

    fn is_complete(&self) -> bool {
        self.received == usize::from(self.total)
    }

    fn assemble(self) -> Vec<u8> {
        self.parts.into_iter().flatten().flatten().collect()
    }
}

/// Single-buffer message reassembler
#[derive(Debug, Default)]
pub struct Reassembler {
    partial: Option<PartialMessage>,
    timeout: Option<Duration>,
}

impl Reassembler {
    /// `timeout` discards a buffer that received nothing for that long;
    /// `None` keeps it until a different message starts.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            partial: None,
            timeout,
        }
    }

    /// Message id of the buffer in progress.
    pub fn in_progress(&self) -> Option<u8> {
        self.partial.as_ref().map(|p| p.message_id)
    }

    /// Fragments held for the message in progress.
    pub fn received_count(&self) -> usize {
        self.partial.as_ref().map_or(0, |p| p.received)
    }

    /// Drop the buffer in progress. Returns whether there was one.
    pub fn reset(&mut self) -> bool {
        self.partial.take().is_some()
    }

    /// Drop the buffer if it outlived the timeout. Returns whether it did.
    pub fn expire(&mut self) -> bool {
        let stale = match (&self.partial, self.timeout) {
            (Some(partial), Some(timeout)) => partial.last_activity.elapsed() >= timeout,
            _ => false,
        };
        if stale {
            debug!(message_id = ?self.in_progress(), "Discarding stale reassembly buffer");
            self.partial = None;
        }
        stale
    }

    /// Feed one data fragment.
    ///
    /// A `total` that disagrees with the buffered message resets the buffer
    /// and is reported as malformed.
    pub fn accept(&mut self, fragment: Fragment) -> Result<Reassembly> {
        if fragment.is_ack() {
            return Err(ProtocolError::MalformedFragment(constants::ERR_ACK_WITH_PAYLOAD));
        }
        if fragment.index >= fragment.total {
            self.partial = None;
            return Err(ProtocolError::MalformedFragment(constants::ERR_INDEX_OUT_OF_RANGE));
        }
        self.expire();

        let same_message = self
            .partial
            .as_ref()
            .is_some_and(|p| p.message_id == fragment.message_id);

        if same_message {
            if self.partial.as_ref().is_some_and(|p| p.total != fragment.total) {
                self.partial = None;
                return Err(ProtocolError::MalformedFragment(constants::ERR_TOTAL_MISMATCH));
            }
        } else {
            if let Some(old) = self.partial.as_ref() {
                debug!(
                    old_id = old.message_id,
                    new_id = fragment.message_id,
                    received = old.received,
                    total = old.total,
                    "Abandoning incomplete message"
                );
            }
            self.partial = Some(PartialMessage::new(fragment.message_id, fragment.total));
        }

        let Some(partial) = self.partial.as_mut() else {
            return Ok(Reassembly::Pending);
        };
        partial.last_activity = Instant::now();

        let slot = &mut partial.parts[usize::from(fragment.index)];
        if slot.is_some() {
            return Ok(Reassembly::Duplicate);
        }
        *slot = Some(fragment.payload);
        partial.received += 1;

        if !partial.is_complete() {
            return Ok(Reassembly::Pending);
        }

        match self.partial.take() {
            Some(done) => Ok(Reassembly::Complete {
                message_id: done.message_id,
                payload: done.assemble(),
            }),
            None => Ok(Reassembly::Pending),
        }
    }
}
