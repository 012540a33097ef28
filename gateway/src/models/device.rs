//! Device inventory models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::GatewayError;

/// Provider families the gateway knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Local relay switches
    Shelly,
    /// Cloud thermostat portal
    Honeywell,
    /// Cloud camera / doorbell service
    Ring,
    /// Flight-tracking receivers
    Piaware,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Shelly,
        DeviceType::Honeywell,
        DeviceType::Ring,
        DeviceType::Piaware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Shelly => "shelly",
            DeviceType::Honeywell => "honeywell",
            DeviceType::Ring => "ring",
            DeviceType::Piaware => "piaware",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shelly" => Ok(DeviceType::Shelly),
            "honeywell" => Ok(DeviceType::Honeywell),
            "ring" => Ok(DeviceType::Ring),
            "piaware" => Ok(DeviceType::Piaware),
            _ => Err(GatewayError::ValidationError(format!(
                "Invalid device type: {}",
                s
            ))),
        }
    }
}

/// Provider-assigned identifier; some providers hand out numbers, others strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(i64),
    Text(String),
}

impl DeviceId {
    /// Canonical string form used for identity comparisons, so that
    /// `42` and `"42"` name the same device.
    pub fn canonical(&self) -> String {
        match self {
            DeviceId::Number(n) => n.to_string(),
            DeviceId::Text(s) => s.trim().to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DeviceId::Number(n) => Value::from(*n),
            DeviceId::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for DeviceId {
    fn from(n: i64) -> Self {
        DeviceId::Number(n)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::Text(s.to_string())
    }
}

/// Service port of a device. Older inventories also store markers such as
/// `"file"` for receivers read from the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DevicePort {
    Number(u16),
    Text(String),
}

impl DevicePort {
    /// Numeric port, also when stored as a numeric string
    pub fn number(&self) -> Option<u16> {
        match self {
            DevicePort::Number(port) => Some(*port),
            DevicePort::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<u16> for DevicePort {
    fn from(port: u16) -> Self {
        DevicePort::Number(port)
    }
}

/// Keys [`DeviceRecord`] maps onto typed fields
const MODELED_KEYS: [&str; 11] = [
    "id", "ip", "name", "room", "icon", "gen", "model", "mac", "type", "port", "url",
];

/// One physical or cloud device in the inventory.
///
/// `name`, `room` and `icon` belong to the user. Everything else is
/// provider data refreshed by discovery. Keys this struct does not model
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DeviceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Relay API generation (1 = legacy REST, 2+ = RPC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Provider-specific kind, e.g. "switch", "doorbell", "thermostat"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<DevicePort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    /// Identity key: canonical `id`, falling back to `ip`
    pub fn identity_key(&self) -> Option<String> {
        if let Some(id) = &self.id {
            let key = id.canonical();
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }

    /// Whether `key` addresses this record by id, canonical id, or ip
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        self.id.as_ref().is_some_and(|id| id.canonical() == key)
            || self.ip.as_deref().is_some_and(|ip| ip.trim() == key)
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.id.as_ref().map(|id| id.canonical()))
    }

    pub fn id_value(&self) -> Value {
        self.id.as_ref().map(DeviceId::to_value).unwrap_or(Value::Null)
    }

    pub fn to_value(&self) -> Result<Value, GatewayError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Drop untyped copies of keys that now have a typed value
    pub fn drop_shadowed_extra(&mut self) {
        let typed = [
            ("id", self.id.is_some()),
            ("ip", self.ip.is_some()),
            ("name", self.name.is_some()),
            ("room", self.room.is_some()),
            ("icon", self.icon.is_some()),
            ("gen", self.gen.is_some()),
            ("model", self.model.is_some()),
            ("mac", self.mac.is_some()),
            ("type", self.kind.is_some()),
            ("port", self.port.is_some()),
            ("url", self.url.is_some()),
        ];
        for (key, present) in typed {
            if present {
                self.extra.remove(key);
            }
        }
    }

    /// Read a record from a stored inventory.
    ///
    /// A modeled key whose value does not fit its typed field is kept
    /// verbatim in `extra` instead of failing the record. Returns `None`
    /// only for entries that are not JSON objects.
    pub fn from_stored(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        if let Ok(record) = serde_json::from_value(Value::Object(fields.clone())) {
            return Some(record);
        }

        let mut unfit = Map::new();
        for key in MODELED_KEYS {
            let Some(value) = fields.get(key) else {
                continue;
            };
            let mut single = Map::new();
            single.insert(key.to_string(), value.clone());
            if serde_json::from_value::<DeviceRecord>(Value::Object(single)).is_err() {
                if let Some(value) = fields.remove(key) {
                    warn!("Keeping device field {:?} untyped: {}", key, value);
                    unfit.insert(key.to_string(), value);
                }
            }
        }

        let mut record: DeviceRecord = serde_json::from_value(Value::Object(fields)).ok()?;
        record.extra.extend(unfit);
        Some(record)
    }
}
