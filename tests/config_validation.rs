//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use cubesat_comms::config::{CdhConfig, LoggingConfig, PacketConfig, RadioConfig, SatelliteConfig};
use cubesat_comms::transport::Modulation;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = SatelliteConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_frequency_out_of_range() {
    let mut config = SatelliteConfig::default();
    config.radio.frequency_mhz = 2400.0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Radio frequency out of range")));
}

#[test]
fn test_transmit_power_out_of_range() {
    let radio = RadioConfig {
        transmit_power: 30,
        ..RadioConfig::default()
    };
    assert!(radio.validate().iter().any(|e| e.contains("Transmit power")));
}

#[test]
fn test_listen_timeout_bounds() {
    let mut packet = PacketConfig::default();
    packet.default_listen_timeout = Duration::from_millis(1);
    assert!(packet.validate().iter().any(|e| e.contains("too short")));

    packet.default_listen_timeout = Duration::from_secs(7200);
    assert!(packet.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_reassembly_timeout_must_cover_fragment_gap() {
    let packet = PacketConfig {
        inter_fragment_delay: Duration::from_secs(1),
        reassembly_timeout: Some(Duration::from_millis(500)),
        ..PacketConfig::default()
    };
    assert!(packet
        .validate()
        .iter()
        .any(|e| e.contains("shorter than the inter-fragment delay")));
}

#[test]
fn test_max_string_length_capped() {
    let packet = PacketConfig {
        max_string_length: 300,
        ..PacketConfig::default()
    };
    assert!(packet.validate().iter().any(|e| e.contains("Max string length too large")));
}

#[test]
fn test_empty_secret_rejected() {
    let cdh = CdhConfig {
        super_secret_code: String::new(),
        ..CdhConfig::default()
    };
    assert!(cdh.validate().iter().any(|e| e.contains("Command secret cannot be empty")));
}

#[test]
fn test_oscar_password_must_differ() {
    let cdh = CdhConfig {
        super_secret_code: "same".to_string(),
        oscar_password: Some("same".to_string()),
        ..CdhConfig::default()
    };
    assert!(cdh.validate().iter().any(|e| e.contains("must differ")));

    let disabled = CdhConfig {
        oscar_password: None,
        ..CdhConfig::default()
    };
    assert!(disabled.validate().is_empty());
}

#[test]
fn test_empty_arg_delimiter_rejected() {
    let cdh = CdhConfig {
        arg_delimiter: Some(String::new()),
        ..CdhConfig::default()
    };
    assert!(cdh.validate().iter().any(|e| e.contains("Argument delimiter")));
}

#[test]
fn test_logging_file_without_path() {
    let logging = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_logging_needs_an_output() {
    let logging = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };
    assert!(logging.validate().iter().any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_collects_errors() {
    let mut config = SatelliteConfig::default();
    config.cdh.cubesat_name = String::new();
    config.radio.transmit_power = 0;

    let err = config.validate_strict().expect_err("should fail");
    let message = err.to_string();
    assert!(message.contains("CubeSat name cannot be empty"));
    assert!(message.contains("Transmit power"));
}

#[test]
fn test_toml_roundtrip() {
    let config = SatelliteConfig::default_with_overrides(|c| {
        c.radio.license = "KK4XYZ".to_string();
        c.radio.modulation = Modulation::Fsk;
        c.packet.reassembly_timeout = Some(Duration::from_secs(5));
        c.cdh.arg_delimiter = Some(",".to_string());
        c.logging.log_level = Level::DEBUG;
    });

    let text = toml::to_string_pretty(&config).expect("serialize");
    let parsed = SatelliteConfig::from_toml(&text).expect("parse");

    assert_eq!(parsed.radio.license, "KK4XYZ");
    assert_eq!(parsed.radio.modulation, Modulation::Fsk);
    assert_eq!(parsed.packet.reassembly_timeout, Some(Duration::from_secs(5)));
    assert_eq!(parsed.packet.default_listen_timeout, Duration::from_secs(10));
    assert_eq!(parsed.cdh.arg_delimiter.as_deref(), Some(","));
    assert_eq!(parsed.cdh.jokes, config.cdh.jokes);
    assert_eq!(parsed.logging.log_level, Level::DEBUG);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let parsed = SatelliteConfig::from_toml(
        r#"
        [radio]
        license = "KK4XYZ"
        modulation = "FSK"
        frequency_mhz = 915.0
        transmit_power = 20
        "#,
    )
    .expect("parse");

    assert_eq!(parsed.radio.modulation, Modulation::Fsk);
    assert_eq!(parsed.packet.reassembly_timeout, None);
    assert_eq!(parsed.cdh.send_delay, Duration::from_millis(200));
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = SatelliteConfig::from_toml("[radio]\nmodulation = \"OOK\"");
    assert!(result.is_err());
}

#[test]
fn test_example_config_parses() {
    let example = SatelliteConfig::example_config();
    assert!(example.contains("[cdh]"));
    SatelliteConfig::from_toml(&example).expect("example config should parse");
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("cubesat-comms-config-{}.toml", std::process::id()));
    let config = SatelliteConfig::default_with_overrides(|c| c.cdh.cubesat_name = "Orbiter".to_string());

    config.save_to_file(&path).expect("save");
    let loaded = SatelliteConfig::from_file(&path).expect("load");
    assert_eq!(loaded.cdh.cubesat_name, "Orbiter");

    std::fs::remove_file(&path).expect("cleanup");
}
