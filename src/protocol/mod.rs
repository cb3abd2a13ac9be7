//! # Protocol Layer
//!
//! The link and command layers above the radio transport.
//!
//! ## Components
//! - **Packet Manager**: fragmentation, reassembly and acknowledgements
//! - **Reassembly**: single-buffer, order-insensitive fragment collection
//! - **Command**: the `name` / `args` / `credential` command frame
//! - **Dispatcher**: name-keyed handler registry
//! - **Commands**: built-in handlers (`reset`, `send_joke`, `change_radio_modulation`, `ping`, `repeat`)
//! - **CDH**: authenticate, execute, acknowledge, respond

pub mod cdh;
pub mod command;
pub mod commands;
pub mod dispatcher;
pub mod packet_manager;
pub mod reassembly;
