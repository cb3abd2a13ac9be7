//! # cubesat-comms
//!
//! Radio protocol stack for small satellites.
//!
//! Telemetry flows sensors → [`core::codec`] → [`protocol::packet_manager`] →
//! [`transport`]; commands flow back up through the packet manager into
//! [`protocol::cdh`], which authenticates and dispatches them.
//!
//! ## Layers
//! - **Codec**: compact self-describing binary frames keyed by FNV-1a hashes
//! - **Packet**: fragment header format and message splitting
//! - **Packet Manager**: fragmentation, reassembly, acknowledgements
//! - **CDH**: command authentication, dispatch and responses
//! - **Beacon**: periodic status frames from registered telemetry sources
//! - **NVM**: counters and flags that survive resets
//!
//! The stack is single-threaded and synchronous. Only sending and listening
//! block, and both are bounded. Malformed or hostile input is logged and
//! dropped; it never panics and never leaves the link out of sync.
//!
//! ## Example
//! ```rust
//! use cubesat_comms::config::SatelliteConfig;
//! use cubesat_comms::nvm::{slots, Counter, Flag, MemoryStore};
//! use cubesat_comms::protocol::cdh::{CommandDataHandler, CommandOutcome};
//! use cubesat_comms::protocol::command::Command;
//! use cubesat_comms::protocol::packet_manager::PacketManager;
//! use cubesat_comms::transport::local::LocalTransport;
//! use std::time::Duration;
//!
//! let config = SatelliteConfig::default_with_overrides(|c| {
//!     c.radio.license = "KK4XYZ".into();
//!     c.packet.inter_fragment_delay = Duration::ZERO;
//!     c.cdh.send_delay = Duration::ZERO;
//! });
//! let (sat_radio, ground_radio) = LocalTransport::pair(128);
//!
//! let nvm = MemoryStore::handle(slots::NVM_SIZE);
//! let counter = Counter::new(nvm.clone(), slots::MESSAGE_COUNTER).unwrap();
//! let pm = PacketManager::new(sat_radio, counter, &config.radio.license, &config.packet).unwrap();
//! let reset = Flag::new(nvm, slots::FLAGS_BYTE, slots::RESET_FLAG_BIT).unwrap();
//! let mut cdh = CommandDataHandler::new(pm, config.cdh.clone(), config.radio.clone())
//!     .with_reset_flag(reset);
//!
//! let ground_nvm = MemoryStore::handle(slots::NVM_SIZE);
//! let counter = Counter::new(ground_nvm, slots::MESSAGE_COUNTER).unwrap();
//! let mut ground = PacketManager::new(ground_radio, counter, "KK4ABC", &config.packet).unwrap();
//!
//! let command = Command::new("send_joke", config.cdh.super_secret_code.as_str());
//! ground.send(&command.encode(None).unwrap());
//!
//! let outcome = cdh.listen_for_commands(Some(Duration::from_millis(100)));
//! assert!(matches!(outcome, CommandOutcome::Executed { .. }));
//! let joke = ground.listen(Some(Duration::from_millis(100))).unwrap();
//! assert!(config.cdh.jokes.contains(&String::from_utf8(joke).unwrap()));
//! ```

pub mod beacon;
pub mod config;
pub mod core;
pub mod error;
pub mod nvm;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::codec::{decode, encode, BinaryEncoder, Frame, KeyMap, Value};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::cdh::{CommandDataHandler, CommandOutcome};
pub use crate::protocol::packet_manager::PacketManager;
pub use crate::transport::{Modulation, Transport};
