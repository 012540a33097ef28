//! Gateway API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic success/failure envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            message: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
        }
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime: u64,
    pub timestamp: DateTime<Utc>,
    pub config: DeviceCounts,
}

/// Number of configured devices per provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub shelly: usize,
    pub honeywell: usize,
    pub ring: usize,
    pub piaware: usize,
}

impl DeviceCounts {
    pub fn total(&self) -> usize {
        self.shelly + self.honeywell + self.ring + self.piaware
    }
}

/// System info response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoResponse {
    pub success: bool,
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
    pub config_version: u32,
    pub uptime: String,
    pub device_count: usize,
}

/// Setup status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
    pub config_exists: bool,
}

/// A single thermostat reading as served by `/api/thermostat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    pub id: Value,
    pub name: Option<String>,
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub outdoor_temp: Option<f64>,
    pub outdoor_humidity: Option<f64>,
    pub mode: String,
    pub status: String,
}

/// Thermostat list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatResponse {
    pub success: bool,
    pub thermostats: Vec<Thermostat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One camera snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub id: Value,
    pub name: Option<String>,
    /// Base64-encoded JPEG
    pub snapshot: Option<String>,
    pub battery: Option<f64>,
    pub wifi: Option<f64>,
    pub status: String,
}

/// Snapshot response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<f64>,
    #[serde(default)]
    pub cameras: Vec<CameraSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Camera settings response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingSettingsResponse {
    pub success: bool,
    pub snapshot_interval: u64,
    pub devices: Vec<Value>,
}

/// Relay status entry; carries the stored record fields plus live state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatus {
    #[serde(flatten)]
    pub device: Value,
    pub on: bool,
    pub power: f64,
    pub online: bool,
}

/// Relay list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatusResponse {
    pub success: bool,
    pub devices: Vec<RelayStatus>,
}

/// Result of switching a single relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayCommandResult {
    pub id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Unified device entry served by `/api/devices`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDevice {
    pub id: Value,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen: Option<u64>,
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    pub online: bool,
}

/// Unified device list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<UnifiedDevice>,
}

/// Credential status; never carries secret values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatusResponse {
    pub honeywell: HoneywellCredentialStatus,
    pub ring: bool,
    pub shelly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneywellCredentialStatus {
    pub configured: bool,
    pub email: String,
}

/// Discovery response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub success: bool,
    pub devices: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Flight tracking status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightTrackingStatus {
    pub enabled: bool,
    pub source: String,
    pub url: Option<String>,
    pub piaware: Vec<Value>,
}

/// Scene activation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneResponse {
    pub success: bool,
    pub scene: String,
    pub devices: usize,
}
