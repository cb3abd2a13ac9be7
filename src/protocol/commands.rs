//! Built-in command handlers.
//!
//! `ping` and `repeat` form the OSCAR set, open to amateur operators holding
//! the OSCAR password. Everything else needs the command secret.

use rand::seq::IndexedRandom;
use tracing::info;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::Command;
use crate::protocol::dispatcher::{CommandContext, Dispatcher, Response};
use crate::transport::Modulation;

pub const RESET: &str = "reset";
pub const SEND_JOKE: &str = "send_joke";
pub const CHANGE_RADIO_MODULATION: &str = "change_radio_modulation";
pub const PING: &str = "ping";
pub const REPEAT: &str = "repeat";

/// Commands the OSCAR password may run.
pub const OSCAR_COMMANDS: &[&str] = &[PING, REPEAT];

pub fn is_oscar_command(name: &str) -> bool {
    OSCAR_COMMANDS.contains(&name)
}

/// Register every built-in on `dispatcher`.
pub fn register_builtins(dispatcher: &mut Dispatcher) {
    dispatcher.register(RESET, reset);
    dispatcher.register(SEND_JOKE, send_joke);
    dispatcher.register(CHANGE_RADIO_MODULATION, change_radio_modulation);
    dispatcher.register(PING, ping);
    dispatcher.register(REPEAT, repeat);
}

/// Raise the reset flag; the main loop restarts once the response is out.
fn reset(ctx: &CommandContext<'_>, _command: &Command) -> Result<Response> {
    let flag = ctx
        .reset_flag
        .ok_or_else(|| ProtocolError::Handler("No reset flag configured".to_string()))?;
    flag.toggle(true)
        .map_err(|e| ProtocolError::Handler(format!("Failed to set reset flag: {e}")))?;
    info!(flag = %flag.name(), "Reset requested");
    Ok(Response::text("Resetting satellite"))
}

fn send_joke(ctx: &CommandContext<'_>, _command: &Command) -> Result<Response> {
    let joke = ctx
        .config
        .jokes
        .choose(&mut rand::rng())
        .ok_or_else(|| ProtocolError::Handler(constants::ERR_NO_JOKES.to_string()))?;
    info!(joke = %joke, "Sending joke");
    Ok(Response::text(joke.as_str()))
}

fn change_radio_modulation(ctx: &CommandContext<'_>, command: &Command) -> Result<Response> {
    let requested = command
        .args
        .first()
        .ok_or_else(|| ProtocolError::Handler(constants::ERR_NO_MODULATION.to_string()))?;
    let modulation: Modulation = requested.parse()?;
    info!(from = %ctx.modulation, to = %modulation, "Radio modulation change scheduled");
    Ok(Response::text(format!("Radio modulation changed: {modulation}")).with_modulation(modulation))
}

fn ping(ctx: &CommandContext<'_>, _command: &Command) -> Result<Response> {
    info!(rssi = ctx.last_rssi, "Ping");
    Ok(Response::text(format!("Pong! {}", ctx.last_rssi)))
}

fn repeat(_ctx: &CommandContext<'_>, command: &Command) -> Result<Response> {
    if command.args.is_empty() {
        return Err(ProtocolError::Handler(constants::ERR_NO_REPEAT_MESSAGE.to_string()));
    }
    let message = command.args.join(" ");
    info!(len = message.len(), "Repeating message");
    Ok(Response::text(message))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::config::CdhConfig;
    use crate::nvm::{Flag, MemoryStore};

    fn context<'a>(config: &'a CdhConfig, flag: Option<&'a Flag>) -> CommandContext<'a> {
        CommandContext {
            config,
            reset_flag: flag,
            last_rssi: -87,
            modulation: Modulation::LoRa,
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        register_builtins(&mut dispatcher);
        dispatcher
    }

    #[test]
    fn test_reset_sets_flag() {
        let config = CdhConfig::default();
        let flag = Flag::new(MemoryStore::handle(4), 0, 0).unwrap();
        let response = dispatcher()
            .dispatch(&context(&config, Some(&flag)), &Command::new(RESET, "x"))
            .unwrap();
        assert!(flag.get().unwrap());
        assert_eq!(response, Response::text("Resetting satellite"));

        let without_flag = dispatcher().dispatch(&context(&config, None), &Command::new(RESET, "x"));
        assert!(matches!(without_flag, Err(ProtocolError::Handler(_))));
    }

    #[test]
    fn test_joke_from_config() {
        let config = CdhConfig::default();
        let response = dispatcher()
            .dispatch(&context(&config, None), &Command::new(SEND_JOKE, "x"))
            .unwrap();
        let joke = String::from_utf8(response.payload.unwrap()).unwrap();
        assert!(config.jokes.contains(&joke));

        let empty = CdhConfig {
            jokes: Vec::new(),
            ..CdhConfig::default()
        };
        assert!(dispatcher()
            .dispatch(&context(&empty, None), &Command::new(SEND_JOKE, "x"))
            .is_err());
    }

    #[test]
    fn test_modulation_change_is_deferred() {
        let config = CdhConfig::default();
        let command = Command::new(CHANGE_RADIO_MODULATION, "x").with_args(["FSK"]);
        let response = dispatcher().dispatch(&context(&config, None), &command).unwrap();
        assert_eq!(response.modulation, Some(Modulation::Fsk));

        let bad = Command::new(CHANGE_RADIO_MODULATION, "x").with_args(["OOK"]);
        assert!(matches!(
            dispatcher().dispatch(&context(&config, None), &bad),
            Err(ProtocolError::InvalidModulation(_))
        ));
        let missing = Command::new(CHANGE_RADIO_MODULATION, "x");
        assert!(dispatcher().dispatch(&context(&config, None), &missing).is_err());
    }

    #[test]
    fn test_oscar_commands() {
        let config = CdhConfig::default();
        let d = dispatcher();
        let pong = d.dispatch(&context(&config, None), &Command::new(PING, "x")).unwrap();
        assert_eq!(pong, Response::text("Pong! -87"));

        let echo = Command::new(REPEAT, "x").with_args(["hello", "ground"]);
        let echoed = d.dispatch(&context(&config, None), &echo).unwrap();
        assert_eq!(echoed, Response::text("hello ground"));
        assert!(d.dispatch(&context(&config, None), &Command::new(REPEAT, "x")).is_err());

        assert!(is_oscar_command(PING));
        assert!(!is_oscar_command(RESET));
    }

    #[test]
    fn test_unknown_command() {
        let config = CdhConfig::default();
        let result = dispatcher().dispatch(&context(&config, None), &Command::new("self_destruct", "x"));
        assert!(matches!(result, Err(ProtocolError::UnknownCommand(name)) if name == "self_destruct"));
    }
}
