//! # Packet Manager
//!
//! Splits outbound messages into radio fragments, reassembles inbound ones
//! and exchanges acknowledgements, on top of any [`Transport`].
//!
//! Every outbound message takes its id from a persistent [`Counter`] so ids
//! keep advancing across resets. Transport failures surface as `false` /
//! `None`; malformed input is logged and dropped.
//!
//! ## Example
//! ```rust
//! use cubesat_comms::config::PacketConfig;
//! use cubesat_comms::nvm::{slots, Counter, MemoryStore};
//! use cubesat_comms::protocol::packet_manager::PacketManager;
//! use cubesat_comms::transport::local::LocalTransport;
//! use std::time::Duration;
//!
//! let (sat_radio, ground_radio) = LocalTransport::pair(64);
//! let config = PacketConfig {
//!     inter_fragment_delay: Duration::ZERO,
//!     ..PacketConfig::default()
//! };
//!
//! let sat_nvm = MemoryStore::handle(slots::NVM_SIZE);
//! let counter = Counter::new(sat_nvm, slots::MESSAGE_COUNTER).unwrap();
//! let mut satellite = PacketManager::new(sat_radio, counter, "KK4XYZ", &config).unwrap();
//!
//! let ground_nvm = MemoryStore::handle(slots::NVM_SIZE);
//! let counter = Counter::new(ground_nvm, slots::MESSAGE_COUNTER).unwrap();
//! let mut ground = PacketManager::new(ground_radio, counter, "KK4XYZ", &config).unwrap();
//!
//! assert!(satellite.send(&[0xAB; 130]));
//! let received = ground.listen(Some(Duration::from_millis(100))).unwrap();
//! assert_eq!(received, vec![0xAB; 130]);
//! ```

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::config::PacketConfig;
use crate::core::packet::{fragment_message, Fragment};
use crate::error::{constants, Result};
use crate::nvm::Counter;
use crate::protocol::reassembly::{Reassembler, Reassembly};
use crate::transport::Transport;
use crate::utils::metrics::LinkMetrics;
use crate::utils::timeout::Deadline;

/// A reassembled message with the metadata needed to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u8,
    pub payload: Vec<u8>,
    /// RSSI of the fragment that completed the message.
    pub rssi: i16,
}

enum LinkEvent {
    Ack(u8),
    Message(InboundMessage),
}

pub struct PacketManager<T: Transport> {
    transport: T,
    counter: Counter,
    license: String,
    inter_fragment_delay: Duration,
    default_listen_timeout: Duration,
    reassembler: Reassembler,
    /// Messages completed while waiting for an acknowledgement.
    inbox: VecDeque<InboundMessage>,
    last_rssi: i16,
    last_sent_message_id: Option<u8>,
    last_acknowledged: Option<u8>,
    metrics: LinkMetrics,
}

impl<T: Transport> PacketManager<T> {
    /// Fails only if the message counter cannot be read.
    pub fn new(transport: T, counter: Counter, license: impl Into<String>, config: &PacketConfig) -> Result<Self> {
        let current = counter.get()?;
        let license = license.into();
        if license.is_empty() {
            warn!("{}", constants::ERR_NO_LICENSE);
        }
        debug!(counter = %counter.name(), current, "Packet manager ready");

        Ok(Self {
            transport,
            counter,
            license,
            inter_fragment_delay: config.inter_fragment_delay,
            default_listen_timeout: config.default_listen_timeout,
            reassembler: Reassembler::new(config.reassembly_timeout),
            inbox: VecDeque::new(),
            last_rssi: 0,
            last_sent_message_id: None,
            last_acknowledged: None,
            metrics: LinkMetrics::new(),
        })
    }

    /// Fragment and transmit `message` as a new message id.
    ///
    /// Nothing is transmitted, and the counter is left alone, if the license
    /// is empty or the message needs more than 255 fragments. Stops at the
    /// first fragment the transport refuses.
    #[instrument(skip(self, message), fields(len = message.len()))]
    pub fn send(&mut self, message: &[u8]) -> bool {
        if self.license.is_empty() {
            warn!("{}", constants::ERR_NO_LICENSE);
            self.metrics.send_failure();
            return false;
        }

        let mut fragments = match fragment_message(0, message, self.transport.max_packet_size()) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(error = %e, "Message rejected before transmission");
                self.metrics.send_failure();
                return false;
            }
        };

        let message_id = match self.counter.next() {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Message counter unavailable");
                self.metrics.send_failure();
                return false;
            }
        };
        for fragment in &mut fragments {
            fragment.message_id = message_id;
        }

        let total = fragments.len();
        for (position, fragment) in fragments.iter().enumerate() {
            if position > 0 && !self.inter_fragment_delay.is_zero() {
                thread::sleep(self.inter_fragment_delay);
            }
            if !self.transport.send(&fragment.to_bytes()) {
                warn!(message_id, index = fragment.index, total, "Transport refused fragment");
                self.metrics.send_failure();
                return false;
            }
            debug!(message_id, index = fragment.index, total, len = fragment.payload.len(), "Fragment sent");
        }

        self.last_sent_message_id = Some(message_id);
        self.metrics.message_sent(message.len(), total);
        debug!(message_id, fragments = total, "Message sent");
        true
    }

    /// Wait for the next complete message; `None` on timeout.
    pub fn listen(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        self.listen_message(timeout).map(|message| message.payload)
    }

    /// Like [`listen`](Self::listen), keeping the message id and RSSI.
    ///
    /// `None` timeout uses the configured default. Acknowledgements heard
    /// meanwhile are recorded in [`last_acknowledged`](Self::last_acknowledged).
    #[instrument(skip(self))]
    pub fn listen_message(&mut self, timeout: Option<Duration>) -> Option<InboundMessage> {
        if let Some(message) = self.inbox.pop_front() {
            return Some(message);
        }

        let deadline = Deadline::after(timeout.unwrap_or(self.default_listen_timeout));
        loop {
            match self.poll(&deadline)? {
                LinkEvent::Ack(_) => continue,
                LinkEvent::Message(message) => return Some(message),
            }
        }
    }

    /// Transmit the acknowledgement for `message_id`.
    pub fn send_acknowledgement(&mut self, message_id: u8) -> bool {
        if self.license.is_empty() {
            warn!("{}", constants::ERR_NO_LICENSE);
            self.metrics.send_failure();
            return false;
        }
        if !self.transport.send(&Fragment::ack(message_id).to_bytes()) {
            warn!(message_id, "Transport refused acknowledgement");
            self.metrics.send_failure();
            return false;
        }
        self.metrics.fragment_sent();
        debug!(message_id, "Acknowledgement sent");
        true
    }

    /// Wait until the peer acknowledges `message_id`.
    ///
    /// Messages completed while waiting are kept for the next `listen`.
    pub fn await_acknowledgement(&mut self, message_id: u8, timeout: Duration) -> bool {
        let deadline = Deadline::after(timeout);
        while let Some(event) = self.poll(&deadline) {
            match event {
                LinkEvent::Ack(id) if id == message_id => return true,
                LinkEvent::Ack(id) => debug!(expected = message_id, got = id, "Unrelated acknowledgement"),
                LinkEvent::Message(message) => self.inbox.push_back(message),
            }
        }
        false
    }

    /// Signal strength of the last received fragment, 0 before any arrive.
    pub fn last_rssi(&self) -> i16 {
        self.last_rssi
    }

    pub fn last_sent_message_id(&self) -> Option<u8> {
        self.last_sent_message_id
    }

    pub fn last_acknowledged(&self) -> Option<u8> {
        self.last_acknowledged
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn metrics(&self) -> &LinkMetrics {
        &self.metrics
    }

    /// Receive fragments until an ack or a complete message shows up.
    fn poll(&mut self, deadline: &Deadline) -> Option<LinkEvent> {
        if self.reassembler.expire() {
            self.metrics.reassembly_abandoned();
        }

        loop {
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                debug!("Listen timeout reached");
                return None;
            }
            let raw = self.transport.receive(Some(remaining))?;
            self.metrics.fragment_received();
            self.last_rssi = self.transport.rssi();

            let fragment = match Fragment::from_bytes(&raw) {
                Ok(fragment) => fragment,
                Err(e) => {
                    warn!(error = %e, len = raw.len(), "Dropping malformed fragment");
                    self.metrics.protocol_error();
                    if self.reassembler.reset() {
                        self.metrics.reassembly_abandoned();
                    }
                    continue;
                }
            };

            if fragment.is_ack() {
                debug!(message_id = fragment.message_id, "Acknowledgement received");
                self.last_acknowledged = Some(fragment.message_id);
                self.metrics.ack_received();
                return Some(LinkEvent::Ack(fragment.message_id));
            }

            let message_id = fragment.message_id;
            if self.reassembler.in_progress().is_some_and(|id| id != message_id) {
                self.metrics.reassembly_abandoned();
            }
            debug!(message_id, index = fragment.index, total = fragment.total, rssi = self.last_rssi, "Fragment received");

            match self.reassembler.accept(fragment) {
                Ok(Reassembly::Complete { message_id, payload }) => {
                    self.metrics.message_received(payload.len());
                    debug!(message_id, len = payload.len(), "Message reassembled");
                    return Some(LinkEvent::Message(InboundMessage {
                        message_id,
                        payload,
                        rssi: self.last_rssi,
                    }));
                }
                Ok(Reassembly::Pending) => {}
                Ok(Reassembly::Duplicate) => debug!(message_id, "Duplicate fragment ignored"),
                Err(e) => {
                    if e.is_protocol_violation() {
                        warn!(error = %e, message_id, "Dropping malformed fragment");
                    } else {
                        error!(error = %e, message_id, "Reassembly failed");
                    }
                    self.metrics.protocol_error();
                    self.metrics.reassembly_abandoned();
                }
            }
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for PacketManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketManager")
            .field("transport", &self.transport)
            .field("counter", &self.counter)
            .field("last_rssi", &self.last_rssi)
            .field("last_sent_message_id", &self.last_sent_message_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::core::packet::FRAGMENT_HEADER_SIZE;
    use crate::nvm::{slots, MemoryStore, NvmHandle};
    use crate::transport::local::LocalTransport;

    const SHORT: Option<Duration> = Some(Duration::from_millis(50));

    fn fast_config() -> PacketConfig {
        PacketConfig {
            inter_fragment_delay: Duration::ZERO,
            ..PacketConfig::default()
        }
    }

    fn manager(transport: LocalTransport, license: &str) -> (PacketManager<LocalTransport>, NvmHandle) {
        let store = MemoryStore::handle(slots::NVM_SIZE);
        let counter = Counter::new(store.clone(), slots::MESSAGE_COUNTER).unwrap();
        let pm = PacketManager::new(transport, counter, license, &fast_config()).unwrap();
        (pm, store)
    }

    #[test]
    fn test_send_fragments_with_counter_id() {
        let (a, _b) = LocalTransport::pair(64);
        let (mut pm, store) = manager(a, "KK4XYZ");
        store.borrow_mut().write(slots::MESSAGE_COUNTER, 41).unwrap();

        assert!(pm.send(&[7; 130]));
        let sent = pm.transport().sent_packets();
        assert_eq!(sent.len(), 3);
        let sizes: Vec<usize> = sent.iter().map(|p| p.len() - FRAGMENT_HEADER_SIZE).collect();
        assert_eq!(sizes, vec![61, 61, 8]);
        assert!(sent.iter().all(|p| p[0] == 42 && p[2] == 3));
        assert_eq!(pm.last_sent_message_id(), Some(42));
        assert_eq!(store.borrow().read(slots::MESSAGE_COUNTER).unwrap(), 42);
    }

    #[test]
    fn test_no_license_sends_nothing() {
        let (a, _b) = LocalTransport::pair(64);
        let (mut pm, store) = manager(a, "");
        assert!(!pm.send(b"hello"));
        assert!(!pm.send_acknowledgement(1));
        assert!(pm.transport().sent_packets().is_empty());
        assert_eq!(store.borrow().read(slots::MESSAGE_COUNTER).unwrap(), 0);
    }

    #[test]
    fn test_oversized_message_rejected_up_front() {
        let (a, _b) = LocalTransport::pair(4);
        let (mut pm, store) = manager(a, "KK4XYZ");
        assert!(!pm.send(&[0; 256]));
        assert!(pm.transport().sent_packets().is_empty());
        assert_eq!(store.borrow().read(slots::MESSAGE_COUNTER).unwrap(), 0);
        assert!(pm.send(&[0; 255]));
        assert_eq!(pm.transport().sent_packets().len(), 255);
    }

    #[test]
    fn test_transport_failure_stops_send() {
        let (a, _b) = LocalTransport::pair(16);
        let (mut pm, _) = manager(a, "KK4XYZ");
        pm.transport_mut().fail_next_sends(1);
        assert!(!pm.send(&[1; 40]));
        assert!(pm.transport().sent_packets().is_empty());
        assert_eq!(pm.metrics().snapshot().send_failures, 1);
    }

    #[test]
    fn test_round_trip_and_ack() {
        let (a, b) = LocalTransport::pair(32);
        let (mut sat, _) = manager(a, "KK4XYZ");
        let (mut ground, _) = manager(b, "KK4XYZ");
        ground.transport_mut().set_rssi(-91);

        let message: Vec<u8> = (0..100).collect();
        assert!(sat.send(&message));
        let inbound = ground.listen_message(SHORT).unwrap();
        assert_eq!(inbound.payload, message);
        assert_eq!(inbound.rssi, -91);
        assert_eq!(ground.last_rssi(), -91);

        assert!(ground.send_acknowledgement(inbound.message_id));
        assert!(sat.await_acknowledgement(inbound.message_id, Duration::from_millis(50)));
        assert_eq!(sat.last_acknowledged(), Some(inbound.message_id));
    }

    #[test]
    fn test_listen_times_out() {
        let (a, _b) = LocalTransport::pair(32);
        let (mut pm, _) = manager(a, "KK4XYZ");
        assert_eq!(pm.listen(Some(Duration::from_millis(10))), None);
        assert_eq!(pm.last_rssi(), 0);
    }

    #[test]
    fn test_malformed_fragment_dropped() {
        let (a, mut raw) = LocalTransport::pair(32);
        let (mut pm, _) = manager(a, "KK4XYZ");

        assert!(raw.send(&[5, 0, 2, 1, 2]));
        assert!(raw.send(&[9]));
        assert!(raw.send(&[5, 1, 2, 3, 4]));
        // The short packet reset reassembly, so message 5 never completes.
        assert_eq!(pm.listen(SHORT), None);
        assert_eq!(pm.metrics().snapshot().protocol_errors, 1);

        assert!(raw.send(&[6, 0, 1, 0xAA]));
        assert_eq!(pm.listen(SHORT), Some(vec![0xAA]));
    }

    #[test]
    fn test_ack_does_not_disturb_reassembly() {
        let (a, mut raw) = LocalTransport::pair(32);
        let (mut pm, _) = manager(a, "KK4XYZ");

        assert!(raw.send(&[3, 1, 2, b'b']));
        assert!(raw.send(&Fragment::ack(77).to_bytes()));
        assert!(raw.send(&[3, 0, 2, b'a']));
        assert_eq!(pm.listen(SHORT), Some(b"ab".to_vec()));
        assert_eq!(pm.last_acknowledged(), Some(77));
    }

    #[test]
    fn test_messages_heard_while_awaiting_ack_are_kept() {
        let (a, mut raw) = LocalTransport::pair(32);
        let (mut pm, _) = manager(a, "KK4XYZ");

        assert!(raw.send(&[8, 0, 1, b'x']));
        assert!(raw.send(&Fragment::ack(2).to_bytes()));
        assert!(pm.await_acknowledgement(2, Duration::from_millis(50)));
        assert!(!pm.await_acknowledgement(3, Duration::from_millis(10)));
        assert_eq!(pm.listen(SHORT), Some(b"x".to_vec()));
    }
}
