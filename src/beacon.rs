//! # Beacon
//!
//! Periodic status frame: satellite name, uptime, radio state and one or
//! more fields per registered [`TelemetrySource`].
//!
//! Sources are read in registration order and numbered by position, so two
//! counters of the same kind still get distinct keys. A source that fails to
//! read is logged and left out; the rest of the beacon still goes out.
//!
//! A ground station that did not build the beacon decodes it with the key map
//! from [`Beacon::generate_key_mapping`], which is stable for a given set of
//! sources whatever their current readings.
//!
//! ## Example
//! ```rust
//! use cubesat_comms::beacon::{Beacon, FnSource};
//! use cubesat_comms::core::codec::Value;
//! use std::time::Instant;
//!
//! let beacon = Beacon::new("PySquared", Instant::now())
//!     .with_source(FnSource::new("battery_level", || Ok(Value::Int(85))));
//!
//! let bytes = beacon.encode(cubesat_comms::transport::Modulation::LoRa, -80).unwrap();
//! let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();
//! assert_eq!(fields["battery_level"].as_i64(), Some(85));
//! assert_eq!(fields["name"].as_str(), Some("PySquared"));
//! ```

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error};

use crate::core::codec::{decode, BinaryEncoder, KeyMap, Value, MAX_STRING_LENGTH};
use crate::error::Result;
use crate::nvm::{Counter, Counter16, Flag};
use crate::protocol::packet_manager::PacketManager;
use crate::transport::{Modulation, Transport};

pub const NAME_KEY: &str = "name";
pub const UPTIME_KEY: &str = "uptime";
pub const MODULATION_KEY: &str = "radio_modulation";
pub const RSSI_KEY: &str = "radio_last_rssi";

/// Something that contributes fields to the beacon.
pub trait TelemetrySource {
    /// Keys this source writes at position `index`. Must not depend on readings.
    fn keys(&self, index: usize) -> Vec<String>;

    /// Current values for [`keys`](Self::keys).
    fn read(&self, index: usize) -> Result<Vec<(String, Value)>>;
}

impl TelemetrySource for Counter {
    fn keys(&self, index: usize) -> Vec<String> {
        vec![format!("{}_{index}", self.name())]
    }

    fn read(&self, index: usize) -> Result<Vec<(String, Value)>> {
        Ok(vec![(format!("{}_{index}", self.name()), Value::UInt(u64::from(self.get()?)))])
    }
}

impl TelemetrySource for Counter16 {
    fn keys(&self, index: usize) -> Vec<String> {
        vec![format!("{}_{index}", self.name())]
    }

    fn read(&self, index: usize) -> Result<Vec<(String, Value)>> {
        Ok(vec![(format!("{}_{index}", self.name()), Value::UInt(u64::from(self.get()?)))])
    }
}

impl TelemetrySource for Flag {
    fn keys(&self, index: usize) -> Vec<String> {
        vec![format!("{}_{index}", self.name())]
    }

    fn read(&self, index: usize) -> Result<Vec<(String, Value)>> {
        Ok(vec![(format!("{}_{index}", self.name()), Value::Int(i64::from(self.get()?)))])
    }
}

/// A single field read through a closure, e.g. a sensor driver call.
pub struct FnSource<F> {
    key: String,
    read: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> Result<Value>,
{
    /// The field is written under `key` as given, without a position suffix.
    pub fn new(key: impl Into<String>, read: F) -> Self {
        Self {
            key: key.into(),
            read,
        }
    }
}

impl<F> TelemetrySource for FnSource<F>
where
    F: Fn() -> Result<Value>,
{
    fn keys(&self, _index: usize) -> Vec<String> {
        vec![self.key.clone()]
    }

    fn read(&self, _index: usize) -> Result<Vec<(String, Value)>> {
        Ok(vec![(self.key.clone(), (self.read)()?)])
    }
}

pub struct Beacon {
    name: String,
    boot_time: Instant,
    sources: Vec<Box<dyn TelemetrySource>>,
    max_string_length: usize,
}

impl Beacon {
    pub fn new(name: impl Into<String>, boot_time: Instant) -> Self {
        Self {
            name: name.into(),
            boot_time,
            sources: Vec::new(),
            max_string_length: MAX_STRING_LENGTH,
        }
    }

    /// Refuse string fields longer than `max`, e.g. `PacketConfig::max_string_length`.
    pub fn with_max_string_length(mut self, max: usize) -> Self {
        self.max_string_length = max;
        self
    }

    pub fn with_source(mut self, source: impl TelemetrySource + 'static) -> Self {
        self.add_source(source);
        self
    }

    pub fn add_source(&mut self, source: impl TelemetrySource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the beacon frame for the given radio state.
    pub fn encode(&self, modulation: Modulation, last_rssi: i16) -> Result<Vec<u8>> {
        let mut encoder = BinaryEncoder::with_max_string_length(self.max_string_length);
        encoder.add_string(NAME_KEY, &self.name)?;
        encoder.add_float(UPTIME_KEY, self.boot_time.elapsed().as_secs_f64());
        encoder.add_string(MODULATION_KEY, modulation.name())?;
        encoder.add_int(RSSI_KEY, i64::from(last_rssi));

        for (index, source) in self.sources.iter().enumerate() {
            // Fields of one source go in together or not at all.
            let mut staged = encoder.clone();
            let added = source.read(index).and_then(|fields| {
                fields
                    .iter()
                    .try_for_each(|(key, value)| staged.add_value(key, value))
            });
            match added {
                Ok(()) => encoder = staged,
                Err(e) => error!(index, error = %e, "Telemetry source failed, skipping"),
            }
        }

        debug!(fields = encoder.len(), "Beacon built");
        Ok(encoder.to_bytes())
    }

    /// Build and send the beacon through `packet_manager`.
    pub fn send<T: Transport>(&self, packet_manager: &mut PacketManager<T>) -> bool {
        let modulation = packet_manager.transport().modulation();
        match self.encode(modulation, packet_manager.last_rssi()) {
            Ok(bytes) => packet_manager.send(&bytes),
            Err(e) => {
                error!(error = %e, "Failed to encode beacon");
                false
            }
        }
    }

    /// Key map for every field this beacon can carry.
    pub fn generate_key_mapping(&self) -> KeyMap {
        let mut key_map = KeyMap::from_keys([NAME_KEY, UPTIME_KEY, MODULATION_KEY, RSSI_KEY]);
        for (index, source) in self.sources.iter().enumerate() {
            for key in source.keys(index) {
                key_map.insert(&key);
            }
        }
        key_map
    }

    /// Decode a beacon into a field map; unknown keys appear as `field_<hash>`.
    pub fn decode_beacon(bytes: &[u8], key_map: Option<&KeyMap>) -> Result<BTreeMap<String, Value>> {
        Ok(decode(bytes, key_map)?.to_map())
    }
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("name", &self.name)
            .field("sources", &self.sources.len())
            .field("max_string_length", &self.max_string_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::config::PacketConfig;
    use crate::core::codec::key_hash;
    use crate::error::ProtocolError;
    use crate::nvm::{slots, MemoryStore};
    use crate::transport::local::LocalTransport;
    use std::time::Duration;

    fn sample_beacon() -> (Beacon, Counter, Flag) {
        let nvm = MemoryStore::handle(slots::NVM_SIZE);
        let boots = Counter::new(nvm.clone(), slots::BOOT_COUNTER).unwrap();
        let deployed = Flag::new(nvm, slots::FLAGS_BYTE, slots::DEPLOYED_FLAG_BIT).unwrap();
        let beacon = Beacon::new("PySquared", Instant::now())
            .with_source(boots.clone())
            .with_source(deployed.clone())
            .with_source(FnSource::new("temperature", || Ok(Value::Float(23.5))));
        (beacon, boots, deployed)
    }

    #[test]
    fn test_beacon_fields() {
        let (beacon, boots, deployed) = sample_beacon();
        boots.increment().unwrap();
        deployed.toggle(true).unwrap();

        let bytes = beacon.encode(Modulation::Fsk, -95).unwrap();
        let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();

        assert_eq!(fields[NAME_KEY].as_str(), Some("PySquared"));
        assert_eq!(fields[MODULATION_KEY].as_str(), Some("FSK"));
        assert_eq!(fields[RSSI_KEY].as_i64(), Some(-95));
        assert!(fields[UPTIME_KEY].as_f64().unwrap() >= 0.0);
        assert_eq!(fields["Counter_index_1_0"].as_u64(), Some(1));
        assert_eq!(fields["Flag_index_16_bit_1_1"].as_i64(), Some(1));
        assert!((fields["temperature"].as_f64().unwrap() - 23.5).abs() < 1e-5);
    }

    #[test]
    fn test_failing_source_is_skipped() {
        let beacon = Beacon::new("PySquared", Instant::now())
            .with_source(FnSource::new("imu", || Err(ProtocolError::Timeout)))
            .with_source(FnSource::new("battery_level", || Ok(Value::Int(85))));

        let bytes = beacon.encode(Modulation::LoRa, 0).unwrap();
        let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();
        assert!(!fields.contains_key("imu"));
        assert_eq!(fields["battery_level"].as_i64(), Some(85));
        assert!(beacon.generate_key_mapping().contains("imu"));
    }

    #[test]
    fn test_decode_without_key_map_uses_hashes() {
        let (beacon, _, _) = sample_beacon();
        let bytes = beacon.encode(Modulation::LoRa, -70).unwrap();
        let fields = Beacon::decode_beacon(&bytes, None).unwrap();
        let expected = format!("field_{:08x}", key_hash(NAME_KEY));
        assert_eq!(fields[&expected].as_str(), Some("PySquared"));
    }

    #[test]
    fn test_send_through_packet_manager() {
        let (beacon, _, _) = sample_beacon();
        let (sat, ground) = LocalTransport::pair(64);
        let config = PacketConfig {
            inter_fragment_delay: Duration::ZERO,
            ..PacketConfig::default()
        };
        let counter = Counter::new(MemoryStore::handle(4), 0).unwrap();
        let mut pm = PacketManager::new(sat, counter, "KK4XYZ", &config).unwrap();
        let counter = Counter::new(MemoryStore::handle(4), 0).unwrap();
        let mut ground = PacketManager::new(ground, counter, "KK4ABC", &config).unwrap();

        assert!(beacon.send(&mut pm));
        let bytes = ground.listen(Some(Duration::from_millis(100))).unwrap();
        let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();
        assert_eq!(fields[NAME_KEY].as_str(), Some("PySquared"));
    }

    #[test]
    fn test_unencodable_source_is_skipped() {
        let beacon = Beacon::new("PySquared", Instant::now())
            .with_source(FnSource::new("battery_level", || Ok(Value::Int(85))))
            .with_source(FnSource::new("log_tail", || Ok(Value::Str("e".repeat(300)))))
            .with_source(FnSource::new("temperature", || Ok(Value::Float(23.5))));

        let bytes = beacon.encode(Modulation::LoRa, -70).unwrap();
        let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();
        assert!(!fields.contains_key("log_tail"));
        assert_eq!(fields["battery_level"].as_i64(), Some(85));
        assert!((fields["temperature"].as_f64().unwrap() - 23.5).abs() < 1e-5);
    }

    #[test]
    fn test_configured_string_limit() {
        let config = PacketConfig {
            max_string_length: 6,
            ..PacketConfig::default()
        };
        let beacon = Beacon::new("Sat", Instant::now())
            .with_max_string_length(config.max_string_length)
            .with_source(FnSource::new("mode", || Ok(Value::Str("safe".to_string()))))
            .with_source(FnSource::new("status", || Ok(Value::Str("detumbling".to_string()))));

        let bytes = beacon.encode(Modulation::LoRa, -70).unwrap();
        let fields = Beacon::decode_beacon(&bytes, Some(&beacon.generate_key_mapping())).unwrap();
        assert_eq!(fields["mode"].as_str(), Some("safe"));
        assert!(!fields.contains_key("status"));

        let renamed = Beacon::new("PySquared", Instant::now()).with_max_string_length(config.max_string_length);
        assert!(matches!(
            renamed.encode(Modulation::LoRa, -70),
            Err(ProtocolError::StringTooLong { len: 9, max: 6 })
        ));
    }
}
