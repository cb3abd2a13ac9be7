//! # Radio Transport
//!
//! The packet manager talks to the radio only through the [`Transport`]
//! trait: an unreliable, ordered, single-outstanding-call packet channel with
//! a bounded packet size. Radio-specific drivers implement it outside this
//! crate; [`local::LocalTransport`] is an in-memory loopback pair for ground
//! tooling and tests.
//!
//! Hardware failures are reported as `false` / `None`, never as panics.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod local;

/// Physical-layer encoding scheme of the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Modulation {
    #[default]
    LoRa,
    #[serde(rename = "FSK")]
    Fsk,
}

impl Modulation {
    pub fn name(self) -> &'static str {
        match self {
            Modulation::LoRa => "LoRa",
            Modulation::Fsk => "FSK",
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modulation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("lora") {
            Ok(Modulation::LoRa)
        } else if s.eq_ignore_ascii_case("fsk") {
            Ok(Modulation::Fsk)
        } else {
            Err(ProtocolError::InvalidModulation(s.to_string()))
        }
    }
}

/// Packet-level radio interface consumed by the packet manager.
pub trait Transport {
    /// Transmit one packet. `false` on hardware failure or oversized input.
    fn send(&mut self, data: &[u8]) -> bool;

    /// Wait up to `timeout` for one packet; `None` uses the driver default.
    fn receive(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>>;

    /// Largest packet the radio accepts, header included.
    fn max_packet_size(&self) -> usize;

    /// Signal strength of the last received packet, in dBm.
    fn rssi(&self) -> i16;

    /// Whether the radio can switch to `modulation`. Checked before a switch
    /// is announced to the ground station.
    fn supports_modulation(&self, _modulation: Modulation) -> bool {
        true
    }

    fn set_modulation(&mut self, modulation: Modulation) -> Result<()>;

    fn modulation(&self) -> Modulation;

    /// Driver-specific setting, e.g. `("spreading_factor", "9")`.
    fn modify_config(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> bool {
        (**self).send(data)
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        (**self).receive(timeout)
    }

    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }

    fn rssi(&self) -> i16 {
        (**self).rssi()
    }

    fn supports_modulation(&self, modulation: Modulation) -> bool {
        (**self).supports_modulation(modulation)
    }

    fn set_modulation(&mut self, modulation: Modulation) -> Result<()> {
        (**self).set_modulation(modulation)
    }

    fn modulation(&self) -> Modulation {
        (**self).modulation()
    }

    fn modify_config(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).modify_config(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulation_parse() {
        assert_eq!("LoRa".parse::<Modulation>().ok(), Some(Modulation::LoRa));
        assert_eq!("fsk".parse::<Modulation>().ok(), Some(Modulation::Fsk));
        assert!(matches!(
            "OOK".parse::<Modulation>(),
            Err(ProtocolError::InvalidModulation(_))
        ));
        assert_eq!(Modulation::Fsk.to_string(), "FSK");
    }
}
