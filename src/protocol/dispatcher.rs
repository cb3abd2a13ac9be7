use crate::config::CdhConfig;
use crate::error::{ProtocolError, Result};
use crate::nvm::Flag;
use crate::protocol::command::Command;
use crate::transport::Modulation;
use std::borrow::Cow;
use std::collections::HashMap;

/// Read-only view of satellite state handed to each handler.
pub struct CommandContext<'a> {
    pub config: &'a CdhConfig,
    /// Flag the main loop polls to perform a restart.
    pub reset_flag: Option<&'a Flag>,
    pub last_rssi: i16,
    pub modulation: Modulation,
}

/// What a handler wants sent back, and any change applied after the ack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub payload: Option<Vec<u8>>,
    pub modulation: Option<Modulation>,
}

impl Response {
    /// Acknowledge only.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Some(text.into().into_bytes()),
            modulation: None,
        }
    }

    pub fn bytes(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            modulation: None,
        }
    }

    /// Switch the radio to `modulation` once the response is out.
    pub fn with_modulation(mut self, modulation: Modulation) -> Self {
        self.modulation = Some(modulation);
        self
    }
}

type HandlerFn = dyn Fn(&CommandContext<'_>, &Command) -> Result<Response> + 'static;

/// Command registry routing by name.
/// Built-in names are static and stored without allocating.
pub struct Dispatcher {
    handlers: HashMap<Cow<'static, str>, Box<HandlerFn>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register<N, F>(&mut self, name: N, handler: F)
    where
        N: Into<Cow<'static, str>>,
        F: Fn(&CommandContext<'_>, &Command) -> Result<Response> + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|name| name.as_ref())
    }

    /// Run the handler for `command.name`; unregistered names are
    /// [`ProtocolError::UnknownCommand`].
    pub fn dispatch(&self, ctx: &CommandContext<'_>, command: &Command) -> Result<Response> {
        self.handlers
            .get(command.name.as_str())
            .ok_or_else(|| ProtocolError::UnknownCommand(command.name.clone()))
            .and_then(|handler| handler(ctx, command))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Dispatcher").field("commands", &names).finish()
    }
}
