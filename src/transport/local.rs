use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ProtocolError, Result};
use crate::transport::{Modulation, Transport};
use crate::utils::timeout::{Deadline, DEFAULT_RECEIVE_TIMEOUT};

/// What travels through the in-memory "air": the packet and the modulation
/// it was sent with.
type AirPacket = (Modulation, Vec<u8>);

/// Most recent transmitted packets kept by [`LocalTransport::sent_packets`].
pub const SENT_LOG_CAPACITY: usize = 256;

/// In-memory radio link endpoint.
///
/// Two endpoints created by [`LocalTransport::pair`] hear each other as long
/// as they use the same modulation; a packet sent in a different modulation
/// than the receiver's is lost, like on a real radio.
#[derive(Debug)]
pub struct LocalTransport {
    tx: Sender<AirPacket>,
    rx: Receiver<AirPacket>,
    max_packet_size: usize,
    modulation: Modulation,
    rssi: i16,
    receive_timeout: Duration,
    failing_sends: usize,
    refused: Vec<Modulation>,
    sent: Vec<Vec<u8>>,
    settings: Vec<(String, String)>,
}

impl LocalTransport {
    /// Create two linked endpoints with the same packet size.
    pub fn pair(max_packet_size: usize) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            Self::new(a_tx, a_rx, max_packet_size),
            Self::new(b_tx, b_rx, max_packet_size),
        )
    }

    fn new(tx: Sender<AirPacket>, rx: Receiver<AirPacket>, max_packet_size: usize) -> Self {
        Self {
            tx,
            rx,
            max_packet_size,
            modulation: Modulation::default(),
            rssi: -70,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            failing_sends: 0,
            refused: Vec::new(),
            sent: Vec::new(),
            settings: Vec::new(),
        }
    }

    /// RSSI reported for packets received on this endpoint.
    pub fn set_rssi(&mut self, rssi: i16) {
        self.rssi = rssi;
    }

    /// Make the next `count` sends report a hardware failure.
    pub fn fail_next_sends(&mut self, count: usize) {
        self.failing_sends = count;
    }

    /// Make this endpoint unable to switch to `modulation`.
    pub fn refuse_modulation(&mut self, modulation: Modulation) {
        if !self.refused.contains(&modulation) {
            self.refused.push(modulation);
        }
    }

    /// Packets this endpoint transmitted successfully, oldest first. Only the
    /// last [`SENT_LOG_CAPACITY`] are kept.
    pub fn sent_packets(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Settings applied through [`Transport::modify_config`].
    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }
}

impl Transport for LocalTransport {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn send(&mut self, data: &[u8]) -> bool {
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            warn!("Simulated radio send failure");
            return false;
        }
        if data.len() > self.max_packet_size {
            warn!(max = self.max_packet_size, "Packet exceeds max packet size");
            return false;
        }
        if self.tx.send((self.modulation, data.to_vec())).is_err() {
            debug!("Peer endpoint dropped");
            return false;
        }
        if self.sent.len() >= SENT_LOG_CAPACITY {
            self.sent.remove(0);
        }
        self.sent.push(data.to_vec());
        true
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        let deadline = Deadline::after(timeout.unwrap_or(self.receive_timeout));
        loop {
            match self.rx.recv_timeout(deadline.remaining()) {
                Ok((modulation, packet)) if modulation == self.modulation => return Some(packet),
                Ok((modulation, _)) => {
                    debug!(sent_with = %modulation, listening = %self.modulation, "Packet lost to modulation mismatch");
                    if deadline.expired() {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn rssi(&self) -> i16 {
        self.rssi
    }

    fn supports_modulation(&self, modulation: Modulation) -> bool {
        !self.refused.contains(&modulation)
    }

    fn set_modulation(&mut self, modulation: Modulation) -> Result<()> {
        if !self.supports_modulation(modulation) {
            return Err(ProtocolError::TransportError(format!(
                "{modulation} is not supported by this radio"
            )));
        }
        debug!(from = %self.modulation, to = %modulation, "Switching modulation");
        self.modulation = modulation;
        Ok(())
    }

    fn modulation(&self) -> Modulation {
        self.modulation
    }

    fn modify_config(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(ProtocolError::TransportError("Empty config key".to_string()));
        }
        self.settings.push((key.to_string(), value.to_string()));
        Ok(())
    }
}
