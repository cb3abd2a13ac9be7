//! Ground command frames.
//!
//! A command travels as a codec frame with three string fields:
//!
//! | key          | contents                                   |
//! |--------------|--------------------------------------------|
//! | `name`       | command to run                             |
//! | `args`       | optional, arguments joined by a delimiter  |
//! | `credential` | shared secret                              |

use std::fmt;

use crate::config::PacketConfig;
use crate::core::codec::{decode, BinaryEncoder, Frame};
use crate::error::{ProtocolError, Result};

pub const NAME_FIELD: &str = "name";
pub const ARGS_FIELD: &str = "args";
pub const CREDENTIAL_FIELD: &str = "credential";

#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    pub credential: String,
}

impl Command {
    pub fn new(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            credential: credential.into(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Read the command fields out of a decoded frame.
    ///
    /// `name` and `credential` must be present as strings; a missing `args`
    /// means no arguments. `delimiter` of `None` splits on whitespace.
    pub fn from_frame(frame: &Frame, delimiter: Option<&str>) -> Result<Self> {
        let name = frame
            .get_str(NAME_FIELD)
            .ok_or(ProtocolError::MissingField(NAME_FIELD))?;
        let credential = frame
            .get_str(CREDENTIAL_FIELD)
            .ok_or(ProtocolError::MissingField(CREDENTIAL_FIELD))?;
        let args = frame
            .get_str(ARGS_FIELD)
            .map(|raw| split_args(raw, delimiter))
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            args,
            credential: credential.to_string(),
        })
    }

    /// Decode a received message into a command.
    pub fn parse(bytes: &[u8], delimiter: Option<&str>) -> Result<Self> {
        let frame = decode(bytes, None)?;
        Self::from_frame(&frame, delimiter)
    }

    /// Encode as a command frame, as a ground station would.
    pub fn encode(&self, delimiter: Option<&str>) -> Result<Vec<u8>> {
        self.encode_into(BinaryEncoder::new(), delimiter)
    }

    /// Like [`encode`](Self::encode), but string fields longer than
    /// `config.max_string_length` are refused.
    pub fn encode_with(&self, config: &PacketConfig, delimiter: Option<&str>) -> Result<Vec<u8>> {
        self.encode_into(config.encoder(), delimiter)
    }

    fn encode_into(&self, mut encoder: BinaryEncoder, delimiter: Option<&str>) -> Result<Vec<u8>> {
        encoder.add_string(NAME_FIELD, &self.name)?;
        if !self.args.is_empty() {
            encoder.add_string(ARGS_FIELD, &self.args.join(delimiter.unwrap_or(" ")))?;
        }
        encoder.add_string(CREDENTIAL_FIELD, &self.credential)?;
        Ok(encoder.to_bytes())
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

fn split_args(raw: &str, delimiter: Option<&str>) -> Vec<String> {
    match delimiter {
        None => raw.split_whitespace().map(str::to_string).collect(),
        Some(delimiter) => raw
            .split(delimiter)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
