//! Camera cloud: bearer-token session, snapshot and health per device

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gateway_api::models::CameraSnapshot;
use http::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::errors::GatewayError;
use crate::models::device::{DeviceId, DeviceRecord};
use crate::session::client::Session;
use crate::session::provider::SessionProvider;
use crate::session::transport::{UpstreamRequest, UpstreamResponse};

pub const API_BASE_URL: &str = "https://api.ring.com/clients_api/";
pub const OAUTH_URL: &str = "https://oauth.ring.com/oauth/token";

const CLIENT_ID: &str = "ring_official_android";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    device_health: DeviceHealth,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceHealth {
    #[serde(default)]
    battery_percentage: Option<Value>,
    #[serde(default)]
    latest_signal_strength: Option<f64>,
}

/// A camera or doorbell as listed by the cloud
#[derive(Debug, Clone, Deserialize)]
pub struct CameraDevice {
    pub id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub battery_life: Option<Value>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceList {
    #[serde(default)]
    doorbots: Vec<CameraDevice>,
    #[serde(default)]
    authorized_doorbots: Vec<CameraDevice>,
    #[serde(default)]
    stickup_cams: Vec<CameraDevice>,
}

/// Numeric value of a field the cloud sends either as a number or a string
fn loose_number(value: &Option<Value>) -> Option<f64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn ensure_success(response: &UpstreamResponse, what: &str) -> Result<(), GatewayError> {
    if !response.status.is_success() {
        return Err(GatewayError::UpstreamError(format!(
            "{} returned {}",
            what, response.status
        )));
    }
    Ok(())
}

/// Camera cloud provider
pub struct CameraCloud {
    api_base: Url,
    oauth_url: Url,
}

impl CameraCloud {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_urls(Url::parse(API_BASE_URL)?, Url::parse(OAUTH_URL)?)
    }

    pub fn with_urls(api_base: Url, oauth_url: Url) -> Result<Self, GatewayError> {
        Ok(Self {
            api_base,
            oauth_url,
        })
    }

    async fn get(&self, session: &Session, path: &str) -> Result<UpstreamResponse, GatewayError> {
        let request = UpstreamRequest::new(Method::GET, session.url(path)?)
            .with_header("Accept", "application/json");
        session.send(request).await
    }

    async fn health(&self, session: &Session, id: &str) -> Result<DeviceHealth, GatewayError> {
        let response = self.get(session, &format!("doorbots/{}/health", id)).await?;
        ensure_success(&response, "device health")?;
        let health: HealthResponse = serde_json::from_slice(&response.body)?;
        Ok(health.device_health)
    }

    /// Cameras and doorbells visible to a logged-in session
    pub async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceRecord>, GatewayError> {
        let response = self.get(session, "ring_devices").await?;
        ensure_success(&response, "device list")?;
        let list: DeviceList = serde_json::from_slice(&response.body)?;

        let doorbells = list
            .doorbots
            .into_iter()
            .chain(list.authorized_doorbots)
            .map(|d| (d, "doorbell"));
        let cameras = list.stickup_cams.into_iter().map(|d| (d, "camera"));

        Ok(doorbells
            .chain(cameras)
            .map(|(device, kind)| {
                let mut record = DeviceRecord {
                    id: Some(DeviceId::Number(device.id)),
                    name: device.description.clone(),
                    kind: Some(kind.to_string()),
                    model: device.kind.clone(),
                    ..Default::default()
                };
                if let Some(level) = loose_number(&device.battery_life) {
                    record.extra.insert("batteryLevel".to_string(), Value::from(level));
                }
                record
            })
            .collect())
    }
}

#[async_trait]
impl SessionProvider for CameraCloud {
    type Credentials = SecretString;
    type Reading = CameraSnapshot;

    fn name(&self) -> &'static str {
        "camera"
    }

    fn base_url(&self) -> &Url {
        &self.api_base
    }

    async fn login(&self, session: &Session, refresh_token: &SecretString) -> Result<(), GatewayError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.expose_secret())
            .append_pair("client_id", CLIENT_ID)
            .append_pair("scope", "client")
            .finish();

        let mut request = UpstreamRequest::new(Method::POST, self.oauth_url.clone());
        request.form = Some(form);
        let response = session.send(request).await?;
        if !response.status.is_success() {
            return Err(GatewayError::AuthError(format!(
                "token exchange returned {}",
                response.status
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)?;
        session.set_bearer(token.access_token);
        info!("Camera cloud session established");
        Ok(())
    }

    async fn fetch(&self, session: &Session, device: &DeviceRecord) -> Result<CameraSnapshot, GatewayError> {
        let id = device
            .id
            .as_ref()
            .ok_or_else(|| GatewayError::ValidationError("camera without id".to_string()))?
            .canonical();

        let response = self.get(session, &format!("snapshots/image/{}", id)).await?;
        ensure_success(&response, "snapshot")?;
        if response.body.is_empty() {
            return Err(GatewayError::UpstreamError("empty snapshot".to_string()));
        }

        // Health is decoration; a snapshot without it is still a reading
        let health = match self.health(session, &id).await {
            Ok(health) => health,
            Err(e) => {
                debug!("No health for camera {}: {}", id, e);
                DeviceHealth::default()
            }
        };

        Ok(CameraSnapshot {
            id: device.id_value(),
            name: device.display_name(),
            snapshot: Some(STANDARD.encode(&response.body)),
            battery: loose_number(&health.battery_percentage),
            wifi: health.latest_signal_strength,
            status: "OK".to_string(),
        })
    }

    fn placeholder(&self, device: &DeviceRecord, _error: &GatewayError) -> CameraSnapshot {
        CameraSnapshot {
            id: device.id_value(),
            name: device.display_name(),
            snapshot: None,
            battery: None,
            wifi: None,
            status: "Error".to_string(),
        }
    }

    fn is_valid(&self, reading: &CameraSnapshot) -> bool {
        reading.snapshot.is_some()
    }
}
