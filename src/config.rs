//! # Configuration Management
//!
//! Centralized configuration for the satellite communications stack.
//!
//! Groups the radio, packet link, command handling and logging settings
//! into one [`SatelliteConfig`] that serializes to TOML.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`CUBESAT_*`) via `from_env()`
//!
//! Durations are written as integer milliseconds.
//!
//! ## Security Considerations
//! - Command credentials are plain shared secrets compared verbatim
//! - An empty radio license disables all transmissions

use crate::core::codec::{BinaryEncoder, MAX_STRING_LENGTH};
use crate::error::{ProtocolError, Result};
use crate::transport::Modulation;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Name reported in beacons and command logs by default
pub const DEFAULT_CUBESAT_NAME: &str = "PySquared";

/// Legacy password for the amateur (OSCAR) command set
pub const DEFAULT_OSCAR_PASSWORD: &str = "Hello World!";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SatelliteConfig {
    /// Radio defaults
    #[serde(default)]
    pub radio: RadioConfig,

    /// Fragmentation and listen settings
    #[serde(default)]
    pub packet: PacketConfig,

    /// Command and data handling
    #[serde(default)]
    pub cdh: CdhConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SatelliteConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults with `CUBESAT_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(license) = std::env::var("CUBESAT_RADIO_LICENSE") {
            config.radio.license = license;
        }

        if let Ok(modulation) = std::env::var("CUBESAT_RADIO_MODULATION") {
            config.radio.modulation = modulation.parse()?;
        }

        if let Ok(name) = std::env::var("CUBESAT_NAME") {
            config.cdh.cubesat_name = name;
        }

        if let Ok(code) = std::env::var("CUBESAT_SECRET_CODE") {
            config.cdh.super_secret_code = code;
        }

        if let Ok(delay) = std::env::var("CUBESAT_SEND_DELAY_MS") {
            if let Ok(val) = delay.parse::<u64>() {
                config.cdh.send_delay = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("CUBESAT_LISTEN_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.packet.default_listen_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.radio.validate());
        errors.extend(self.packet.validate());
        errors.extend(self.cdh.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Radio defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    /// Amateur radio license (call sign); empty disables transmission
    pub license: String,

    /// Modulation applied at startup
    pub modulation: Modulation,

    /// Carrier frequency in MHz
    pub frequency_mhz: f64,

    /// Transmit power in dBm
    pub transmit_power: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            license: String::new(),
            modulation: Modulation::LoRa,
            frequency_mhz: 437.4,
            transmit_power: 23,
        }
    }
}

impl RadioConfig {
    /// Validate radio configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(137.0..=960.0).contains(&self.frequency_mhz) {
            errors.push(format!(
                "Radio frequency out of range: {} MHz (valid range: 137-960)",
                self.frequency_mhz
            ));
        }

        if !(5..=23).contains(&self.transmit_power) {
            errors.push(format!(
                "Transmit power out of range: {} dBm (valid range: 5-23)",
                self.transmit_power
            ));
        }

        errors
    }
}

/// Packet link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacketConfig {
    /// Pause between fragments of one message
    #[serde(with = "duration_serde")]
    pub inter_fragment_delay: Duration,

    /// Listen bound used when the caller gives none
    #[serde(with = "duration_serde")]
    pub default_listen_timeout: Duration,

    /// Discard a partial message idle this long (unset keeps it until a new message starts)
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub reassembly_timeout: Option<Duration>,

    /// Longest string field the encoder accepts
    pub max_string_length: usize,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            inter_fragment_delay: timeout::INTER_FRAGMENT_DELAY,
            default_listen_timeout: timeout::DEFAULT_LISTEN_TIMEOUT,
            reassembly_timeout: None,
            max_string_length: MAX_STRING_LENGTH,
        }
    }
}

impl PacketConfig {
    /// Encoder that enforces [`max_string_length`](Self::max_string_length).
    pub fn encoder(&self) -> BinaryEncoder {
        BinaryEncoder::with_max_string_length(self.max_string_length)
    }

    /// Validate packet configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.inter_fragment_delay.as_secs() > 5 {
            errors.push("Inter-fragment delay too long (maximum: 5s)".to_string());
        }

        if self.default_listen_timeout.as_millis() < 10 {
            errors.push("Default listen timeout too short (minimum: 10ms)".to_string());
        } else if self.default_listen_timeout.as_secs() > 3600 {
            errors.push("Default listen timeout too long (maximum: 1 hour)".to_string());
        }

        if let Some(reassembly) = self.reassembly_timeout {
            if reassembly.as_millis() < 100 {
                errors.push("Reassembly timeout too short (minimum: 100ms)".to_string());
            } else if reassembly < self.inter_fragment_delay {
                errors.push(
                    "Reassembly timeout shorter than the inter-fragment delay".to_string(),
                );
            }
        }

        if self.max_string_length == 0 {
            errors.push("Max string length must be greater than 0".to_string());
        } else if self.max_string_length > MAX_STRING_LENGTH {
            errors.push(format!(
                "Max string length too large: {} (maximum: {MAX_STRING_LENGTH})",
                self.max_string_length
            ));
        }

        errors
    }
}

/// Command and data handling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdhConfig {
    /// Satellite name, reported in beacons
    pub cubesat_name: String,

    /// Credential required on every command
    pub super_secret_code: String,

    /// Credential for the OSCAR set (`ping`, `repeat`); unset disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscar_password: Option<String>,

    /// Pause between an acknowledgement and the response
    #[serde(with = "duration_serde")]
    pub send_delay: Duration,

    /// Responses for `send_joke`
    #[serde(default)]
    pub jokes: Vec<String>,

    /// Separator for the `args` field (unset splits on whitespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_delimiter: Option<String>,
}

impl Default for CdhConfig {
    fn default() -> Self {
        Self {
            cubesat_name: String::from(DEFAULT_CUBESAT_NAME),
            super_secret_code: String::from("ABCD"),
            oscar_password: Some(String::from(DEFAULT_OSCAR_PASSWORD)),
            send_delay: timeout::SEND_DELAY,
            jokes: vec![
                String::from("Hey it is pretty cold up here, did someone forget to pay the electric bill?"),
                String::from("Why did the satellite break up with the moon? It needed more space."),
            ],
            arg_delimiter: None,
        }
    }
}

impl CdhConfig {
    /// Validate command handling configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.cubesat_name.is_empty() {
            errors.push("CubeSat name cannot be empty".to_string());
        } else if self.cubesat_name.len() > MAX_STRING_LENGTH {
            errors.push(format!(
                "CubeSat name too long: {} characters (maximum: {MAX_STRING_LENGTH})",
                self.cubesat_name.len()
            ));
        }

        if self.super_secret_code.is_empty() {
            errors.push("Command secret cannot be empty".to_string());
        }

        if let Some(ref oscar) = self.oscar_password {
            if oscar.is_empty() {
                errors.push("OSCAR password cannot be empty (omit it to disable)".to_string());
            } else if *oscar == self.super_secret_code {
                errors.push("OSCAR password must differ from the command secret".to_string());
            }
        }

        if self.send_delay.as_secs() > 10 {
            errors.push("Send delay too long (maximum: 10s)".to_string());
        }

        if let Some(pos) = self.jokes.iter().position(|j| j.len() > MAX_STRING_LENGTH * 8) {
            errors.push(format!("Joke {pos} is too long to send"));
        }

        if matches!(self.arg_delimiter.as_deref(), Some("")) {
            errors.push("Argument delimiter cannot be empty (omit it to split on whitespace)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("cubesat-comms"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Optional durations, as milliseconds
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
