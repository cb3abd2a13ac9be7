//! # Command and Data Handling
//!
//! Listens for ground commands, authenticates them, runs the matching
//! handler and sends the acknowledgement and response.
//!
//! Each call to [`CommandDataHandler::listen_for_commands`] handles at most
//! one command and walks the states
//! `Idle → Authenticating → Executing → Responding → Idle`. Whatever
//! happens, the handler is back in `Idle` when the call returns:
//!
//! - undecodable frames and bad credentials are logged and dropped, nothing is sent
//! - unknown commands are acknowledged and otherwise ignored
//! - handler failures are logged, nothing is sent
//!
//! A change of modulation is applied only after the response went out in the
//! old modulation, so the ground station hears it. The radio is asked first
//! whether it supports the new modulation; if not, the ground station is told
//! the change failed and the link stays where it is.

use std::borrow::Cow;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{CdhConfig, RadioConfig};
use crate::error::{ProtocolError, Result};
use crate::nvm::{Counter16, Flag};
use crate::protocol::command::Command;
use crate::protocol::commands::{is_oscar_command, register_builtins};
use crate::protocol::dispatcher::{CommandContext, Dispatcher, Response};
use crate::protocol::packet_manager::PacketManager;
use crate::transport::{Modulation, Transport};

/// Stage of command processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdhState {
    #[default]
    Idle,
    Authenticating,
    Executing,
    Responding,
}

/// How one `listen_for_commands` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Nothing arrived before the timeout.
    NoMessage,
    /// The message was not a valid command frame.
    Malformed,
    /// Bad credential; nothing was run or sent.
    Rejected,
    /// Authenticated but not registered; acknowledged only.
    Unrecognized(String),
    Executed { command: String, response_sent: bool },
    /// The handler returned an error, or the radio could not take the
    /// requested modulation.
    Failed { command: String },
}

/// Which credential a command carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authority {
    Operator,
    Oscar,
}

pub struct CommandDataHandler<T: Transport> {
    packet_manager: PacketManager<T>,
    config: CdhConfig,
    radio: RadioConfig,
    dispatcher: Dispatcher,
    state: CdhState,
    reset_flag: Option<Flag>,
    command_counter: Option<Counter16>,
}

impl<T: Transport> CommandDataHandler<T> {
    /// Handler with the built-in command set.
    pub fn new(packet_manager: PacketManager<T>, config: CdhConfig, radio: RadioConfig) -> Self {
        let mut dispatcher = Dispatcher::new();
        register_builtins(&mut dispatcher);
        Self {
            packet_manager,
            config,
            radio,
            dispatcher,
            state: CdhState::Idle,
            reset_flag: None,
            command_counter: None,
        }
    }

    /// Flag raised by the `reset` command.
    pub fn with_reset_flag(mut self, flag: Flag) -> Self {
        self.reset_flag = Some(flag);
        self
    }

    /// Persistent count of successfully executed commands.
    pub fn with_command_counter(mut self, counter: Counter16) -> Self {
        self.command_counter = Some(counter);
        self
    }

    /// Add or replace a command.
    pub fn register<N, F>(&mut self, name: N, handler: F)
    where
        N: Into<Cow<'static, str>>,
        F: Fn(&CommandContext<'_>, &Command) -> Result<Response> + 'static,
    {
        self.dispatcher.register(name, handler);
    }

    pub fn state(&self) -> CdhState {
        self.state
    }

    pub fn config(&self) -> &CdhConfig {
        &self.config
    }

    /// Radio settings, including the modulation last commanded.
    pub fn radio_config(&self) -> &RadioConfig {
        &self.radio
    }

    pub fn packet_manager(&self) -> &PacketManager<T> {
        &self.packet_manager
    }

    pub fn packet_manager_mut(&mut self) -> &mut PacketManager<T> {
        &mut self.packet_manager
    }

    /// Wait up to `timeout` for one command and process it.
    #[instrument(skip(self))]
    pub fn listen_for_commands(&mut self, timeout: Option<Duration>) -> CommandOutcome {
        self.state = CdhState::Idle;
        let outcome = self.process(timeout);
        self.state = CdhState::Idle;
        outcome
    }

    fn process(&mut self, timeout: Option<Duration>) -> CommandOutcome {
        let Some(inbound) = self.packet_manager.listen_message(timeout) else {
            return CommandOutcome::NoMessage;
        };

        self.state = CdhState::Authenticating;
        let command = match Command::parse(&inbound.payload, self.config.arg_delimiter.as_deref()) {
            Ok(command) => command,
            Err(e) => {
                if e.is_protocol_violation() {
                    warn!(error = %e, message_id = inbound.message_id, "Dropping malformed command");
                } else {
                    error!(error = %e, message_id = inbound.message_id, "Failed to parse command");
                }
                self.packet_manager.metrics().protocol_error();
                return CommandOutcome::Malformed;
            }
        };

        let authority = match self.authenticate(&command) {
            Ok(authority) => authority,
            Err(e) => {
                warn!(command = %command.name, message_id = inbound.message_id, error = %e, "Command rejected");
                self.packet_manager.metrics().auth_failure();
                return CommandOutcome::Rejected;
            }
        };
        debug!(command = %command.name, ?authority, args = command.args.len(), "Command authenticated");

        self.state = CdhState::Executing;
        let ctx = CommandContext {
            config: &self.config,
            reset_flag: self.reset_flag.as_ref(),
            last_rssi: self.packet_manager.last_rssi(),
            modulation: self.radio.modulation,
        };
        let response = match self.dispatcher.dispatch(&ctx, &command) {
            Ok(response) => response,
            Err(ProtocolError::UnknownCommand(name)) => {
                warn!(command = %name, "Unknown command received");
                self.state = CdhState::Responding;
                self.packet_manager.send_acknowledgement(inbound.message_id);
                return CommandOutcome::Unrecognized(name);
            }
            Err(e) => {
                error!(command = %command.name, error = %e, "Command handler failed");
                self.packet_manager.metrics().handler_error();
                return CommandOutcome::Failed { command: command.name };
            }
        };

        if let Some(modulation) = response.modulation {
            if !self.packet_manager.transport().supports_modulation(modulation) {
                let e = ProtocolError::TransportError(format!("{modulation} is not supported by the radio"));
                self.state = CdhState::Responding;
                self.report_modulation_failure(Some(inbound.message_id), &e);
                return CommandOutcome::Failed { command: command.name };
            }
        }

        info!(command = %command.name, "Command executed");
        self.packet_manager.metrics().command_executed();
        if let Some(counter) = &self.command_counter {
            if let Err(e) = counter.increment() {
                error!(error = %e, "Failed to count executed command");
            }
        }

        self.state = CdhState::Responding;
        let modulation = response.modulation;
        let response_sent = self.respond(inbound.message_id, response);

        if let Some(modulation) = modulation {
            if let Err(e) = self.switch_modulation(modulation) {
                self.report_modulation_failure(None, &e);
                return CommandOutcome::Failed { command: command.name };
            }
        }
        CommandOutcome::Executed {
            command: command.name,
            response_sent,
        }
    }

    fn authenticate(&self, command: &Command) -> Result<Authority> {
        if command.credential.is_empty() {
            return Err(ProtocolError::AuthenticationFailure);
        }
        if command.credential == self.config.super_secret_code {
            return Ok(Authority::Operator);
        }
        match self.config.oscar_password.as_deref() {
            Some(oscar) if command.credential == oscar && is_oscar_command(&command.name) => {
                Ok(Authority::Oscar)
            }
            _ => Err(ProtocolError::AuthenticationFailure),
        }
    }

    /// Ack, pause for the ground station to turn around, then respond.
    fn respond(&mut self, message_id: u8, response: Response) -> bool {
        if !self.packet_manager.send_acknowledgement(message_id) {
            warn!(message_id, "Failed to acknowledge command");
        }
        if response.payload.is_none() && response.modulation.is_none() {
            return false;
        }

        if !self.config.send_delay.is_zero() {
            thread::sleep(self.config.send_delay);
        }

        match response.payload {
            Some(payload) => self.packet_manager.send(&payload),
            None => false,
        }
    }

    /// Tell the ground station the link stays on the current modulation.
    /// With `ack` set the command has not been acknowledged yet.
    fn report_modulation_failure(&mut self, ack: Option<u8>, e: &ProtocolError) {
        error!(error = %e, current = %self.radio.modulation, "Failed to change radio modulation");
        self.packet_manager.metrics().handler_error();
        let text = format!("Failed to change radio modulation: {e}");
        let sent = match ack {
            Some(message_id) => self.respond(message_id, Response::text(text)),
            None => self.packet_manager.send(text.as_bytes()),
        };
        if !sent {
            warn!("Failed to report modulation failure");
        }
    }

    fn switch_modulation(&mut self, modulation: Modulation) -> Result<()> {
        self.packet_manager.transport_mut().set_modulation(modulation)?;
        info!(from = %self.radio.modulation, to = %modulation, "Radio modulation changed");
        self.radio.modulation = modulation;
        Ok(())
    }
}

impl<T: Transport + fmt::Debug> fmt::Debug for CommandDataHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDataHandler")
            .field("state", &self.state)
            .field("dispatcher", &self.dispatcher)
            .field("packet_manager", &self.packet_manager)
            .finish_non_exhaustive()
    }
}
