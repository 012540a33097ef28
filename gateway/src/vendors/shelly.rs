//! Local relay switches
//!
//! Generation 2+ devices speak JSON-RPC over HTTP; generation 1 devices
//! use the legacy `/relay/0` REST endpoint.

use std::time::Duration;

use futures::future::join_all;
use gateway_api::models::{RelayCommandResult, RelayStatus};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::models::device::{DeviceId, DeviceRecord};

/// Timeout for status reads
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(2);
/// Timeout for switch commands
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for discovery probes
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Live relay state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayReading {
    pub on: bool,
    pub power: f64,
}

#[derive(Debug, Deserialize)]
struct RelayPayload {
    #[serde(default)]
    output: Option<bool>,
    #[serde(default)]
    ison: Option<bool>,
    #[serde(default)]
    apower: Option<f64>,
    #[serde(default)]
    power: Option<f64>,
}

impl RelayPayload {
    fn reading(&self, rpc: bool) -> RelayReading {
        let on = if rpc { self.output } else { self.ison };
        RelayReading {
            on: on.unwrap_or(false),
            power: self.apower.or(self.power).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcDeviceInfo {
    id: Option<String>,
    mac: Option<String>,
    model: Option<String>,
    name: Option<String>,
    #[serde(default)]
    gen: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LegacyDeviceInfo {
    #[serde(rename = "type")]
    device_type: Option<String>,
    mac: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

fn uses_rpc(device: &DeviceRecord) -> bool {
    device.gen.unwrap_or(1) >= 2
}

fn host(device: &DeviceRecord) -> Result<&str, GatewayError> {
    device
        .ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| GatewayError::ValidationError("relay has no ip".to_string()))
}

/// Relay kind for a model string
pub fn detect_kind(model: &str) -> &'static str {
    let model = model.to_uppercase();
    if model.contains("DIMMER") || model.contains("SNDM") {
        "dimmer"
    } else if model.contains("PLUG") || model.contains("SNPL") {
        "plug"
    } else if model.contains("BULB") || model.contains("DUO") || model.contains("VINTAGE") {
        "bulb"
    } else if model.contains("RGBW") {
        "rgbw"
    } else if model.contains("BUTTON") || model.contains("I3") || model.contains("I4") {
        "button"
    } else if model.contains("HT") || model.contains("DW") || model.contains("FLOOD") || model.contains("MOTION") {
        "sensor"
    } else {
        "switch"
    }
}

/// HTTP client for relays on the local network
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
}

impl RelayClient {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, GatewayError> {
        debug!("GET {}", url);
        let response = self.client.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::UpstreamError(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Current state of one relay
    pub async fn status(&self, device: &DeviceRecord) -> Result<RelayReading, GatewayError> {
        let rpc = uses_rpc(device);
        let url = if rpc {
            format!("http://{}/rpc/Switch.GetStatus?id=0", host(device)?)
        } else {
            format!("http://{}/relay/0", host(device)?)
        };
        let payload: RelayPayload = serde_json::from_value(self.get_json(&url, STATUS_TIMEOUT).await?)?;
        Ok(payload.reading(rpc))
    }

    /// Switch one relay on or off
    pub async fn set(&self, device: &DeviceRecord, on: bool) -> Result<(), GatewayError> {
        let url = if uses_rpc(device) {
            format!("http://{}/rpc/Switch.Set?id=0&on={}", host(device)?, on)
        } else {
            let turn = if on { "on" } else { "off" };
            format!("http://{}/relay/0?turn={}", host(device)?, turn)
        };
        self.get_json(&url, COMMAND_TIMEOUT).await?;
        Ok(())
    }

    /// Status of every relay; unreachable relays are reported offline
    pub async fn status_all(&self, devices: &[DeviceRecord]) -> Vec<RelayStatus> {
        join_all(devices.iter().map(|device| async move {
            let reading = self.status(device).await;
            let device_value = device.to_value().unwrap_or(Value::Null);
            match reading {
                Ok(reading) => RelayStatus {
                    device: device_value,
                    on: reading.on,
                    power: reading.power,
                    online: true,
                },
                Err(e) => {
                    debug!("Relay {:?} offline: {}", device.identity_key(), e);
                    RelayStatus {
                        device: device_value,
                        on: false,
                        power: 0.0,
                        online: false,
                    }
                }
            }
        }))
        .await
    }

    /// Switch every relay in `devices`, one result per relay
    pub async fn set_all(&self, devices: &[DeviceRecord], on: bool) -> Vec<RelayCommandResult> {
        join_all(devices.iter().map(|device| async move {
            let id = device.identity_key();
            match self.set(device, on).await {
                Ok(()) => RelayCommandResult {
                    id,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!("Relay {:?} did not switch: {}", id, e);
                    RelayCommandResult {
                        id,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        }))
        .await
    }

    /// Identify a relay at `host`, trying the RPC API first
    pub async fn probe(&self, host: &str) -> Option<DeviceRecord> {
        let rpc_url = format!("http://{}/rpc/Shelly.GetDeviceInfo", host);
        if let Ok(value) = self.get_json(&rpc_url, PROBE_TIMEOUT).await {
            if let Ok(info) = serde_json::from_value::<RpcDeviceInfo>(value) {
                let model = info.model.clone().unwrap_or_default();
                return Some(DeviceRecord {
                    id: info.id.map(DeviceId::Text),
                    ip: Some(host.to_string()),
                    name: info.name,
                    gen: Some(info.gen.unwrap_or(2)),
                    kind: Some(detect_kind(&model).to_string()),
                    model: info.model,
                    mac: info.mac,
                    ..Default::default()
                });
            }
        }

        let legacy_url = format!("http://{}/shelly", host);
        let value = self.get_json(&legacy_url, PROBE_TIMEOUT).await.ok()?;
        let info: LegacyDeviceInfo = serde_json::from_value(value).ok()?;
        let model = info.device_type.clone()?;
        let id = info
            .id
            .or_else(|| info.mac.as_ref().map(|mac| format!("shelly1-{}", mac.to_lowercase())));
        Some(DeviceRecord {
            id: id.map(DeviceId::Text),
            ip: Some(host.to_string()),
            gen: Some(1),
            kind: Some(detect_kind(&model).to_string()),
            model: Some(model),
            mac: info.mac,
            ..Default::default()
        })
    }
}
