//! Durable gateway configuration document

use gateway_api::models::DeviceCounts;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::device::{DeviceRecord, DeviceType};

/// Current schema version. Bump when adding fields that need defaults.
pub const CONFIG_VERSION: u32 = 2;

/// Version assumed for documents written before versioning existed
pub const LEGACY_CONFIG_VERSION: u32 = 1;

fn legacy_version() -> u32 {
    LEGACY_CONFIG_VERSION
}

/// The device inventory plus user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_version", default = "legacy_version")]
    pub version: u32,

    #[serde(default)]
    pub shelly: Vec<DeviceRecord>,

    #[serde(default)]
    pub honeywell: Vec<DeviceRecord>,

    #[serde(default)]
    pub ring: Vec<DeviceRecord>,

    #[serde(default)]
    pub piaware: Vec<DeviceRecord>,

    #[serde(rename = "flightTracking", default)]
    pub flight_tracking: FlightTracking,

    #[serde(default)]
    pub location: Map<String, Value>,

    #[serde(default)]
    pub scenes: Vec<Value>,

    #[serde(default)]
    pub settings: GatewaySettings,

    /// Top-level keys written by newer or older releases
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            shelly: Vec::new(),
            honeywell: Vec::new(),
            ring: Vec::new(),
            piaware: Vec::new(),
            flight_tracking: FlightTracking::default(),
            location: Map::new(),
            scenes: Vec::new(),
            settings: GatewaySettings::default(),
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Read a stored document, device by device.
    ///
    /// Records that do not match the schema are kept with their odd fields
    /// untyped. Entries that are not objects cannot be represented and are
    /// counted in the returned total instead of failing the document.
    pub fn from_stored(mut value: Value) -> Result<(Config, usize), serde_json::Error> {
        let mut lists = Vec::new();
        if let Value::Object(map) = &mut value {
            for device_type in DeviceType::ALL {
                if let Some(list) = map.remove(device_type.as_str()) {
                    lists.push((device_type, list));
                }
            }
        }

        let mut config: Config = serde_json::from_value(value)?;
        let mut dropped = 0;
        for (device_type, list) in lists {
            let entries = match list {
                Value::Array(entries) => entries,
                Value::Null => continue,
                other => {
                    warn!("Ignoring {} list that is not an array: {}", device_type, other);
                    dropped += 1;
                    continue;
                }
            };
            for entry in entries {
                match DeviceRecord::from_stored(entry.clone()) {
                    Some(record) => config.devices_mut(device_type).push(record),
                    None => {
                        warn!("Ignoring {} entry that is not an object: {}", device_type, entry);
                        dropped += 1;
                    }
                }
            }
        }
        Ok((config, dropped))
    }

    /// Devices of one provider type, in insertion order
    pub fn devices(&self, device_type: DeviceType) -> &[DeviceRecord] {
        match device_type {
            DeviceType::Shelly => &self.shelly,
            DeviceType::Honeywell => &self.honeywell,
            DeviceType::Ring => &self.ring,
            DeviceType::Piaware => &self.piaware,
        }
    }

    pub fn devices_mut(&mut self, device_type: DeviceType) -> &mut Vec<DeviceRecord> {
        match device_type {
            DeviceType::Shelly => &mut self.shelly,
            DeviceType::Honeywell => &mut self.honeywell,
            DeviceType::Ring => &mut self.ring,
            DeviceType::Piaware => &mut self.piaware,
        }
    }

    pub fn counts(&self) -> DeviceCounts {
        DeviceCounts {
            shelly: self.shelly.len(),
            honeywell: self.honeywell.len(),
            ring: self.ring.len(),
            piaware: self.piaware.len(),
        }
    }

    /// True when none of the controllable providers has a device yet
    pub fn needs_setup(&self) -> bool {
        self.shelly.is_empty() && self.honeywell.is_empty() && self.ring.is_empty()
    }

    /// Distinct relay rooms in first-seen order
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = Vec::new();
        for room in self.shelly.iter().filter_map(|d| d.room.as_ref()) {
            if !rooms.iter().any(|r| r == room) {
                rooms.push(room.clone());
            }
        }
        rooms
    }
}

/// Flight feed selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightTracking {
    #[serde(default)]
    pub enabled: bool,

    /// "auto" (default), "local" or "remote"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where aircraft data is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightSource {
    Auto,
    Local,
    Remote,
}

impl FlightTracking {
    pub fn source(&self) -> FlightSource {
        match self.source.as_deref() {
            Some("local") => FlightSource::Local,
            Some("remote") => FlightSource::Remote,
            _ => FlightSource::Auto,
        }
    }
}

/// User-facing settings block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    /// Camera snapshot freshness window, seconds
    #[serde(default = "default_snapshot_interval")]
    pub ring_snapshot_interval: u64,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_temperature_unit")]
    pub temperature_unit: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bounds applied when the snapshot interval is changed over the API
pub const MIN_SNAPSHOT_INTERVAL_SECS: u64 = 5;
pub const MAX_SNAPSHOT_INTERVAL_SECS: u64 = 300;

fn default_snapshot_interval() -> u64 {
    30
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_temperature_unit() -> String {
    "F".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            ring_snapshot_interval: default_snapshot_interval(),
            theme: default_theme(),
            temperature_unit: default_temperature_unit(),
            extra: Map::new(),
        }
    }
}

impl GatewaySettings {
    pub fn clamp_snapshot_interval(secs: u64) -> u64 {
        secs.clamp(MIN_SNAPSHOT_INTERVAL_SECS, MAX_SNAPSHOT_INTERVAL_SECS)
    }

    /// Clamp a requested interval; fractions are truncated and NaN maps to the minimum
    pub fn clamp_snapshot_secs(secs: f64) -> u64 {
        if secs.is_nan() {
            return MIN_SNAPSHOT_INTERVAL_SECS;
        }
        let clamped = secs.clamp(
            MIN_SNAPSHOT_INTERVAL_SECS as f64,
            MAX_SNAPSHOT_INTERVAL_SECS as f64,
        );
        clamped as u64
    }
}
