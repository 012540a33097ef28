//! Device discovery endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::DiscoveryResponse;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::app::state::{AppState, DiscoveryCredentials};
use crate::errors::GatewayError;
use crate::models::device::{DeviceRecord, DeviceType};
use crate::server::handlers::{soft_failure, ApiJson};
use crate::server::state::ServerState;
use crate::storage::credentials::PortalCredentials;

#[derive(Debug, Default, Deserialize)]
pub struct RescanRequest {
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    #[serde(default)]
    pub save: Option<String>,
}

/// Credentials typed into the setup wizard before anything is stored
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardCredentials {
    #[serde(default)]
    pub honeywell_email: Option<String>,
    #[serde(default)]
    pub honeywell_password: Option<String>,
    #[serde(default)]
    pub ring_token: Option<String>,
}

impl WizardCredentials {
    fn into_discovery(self) -> DiscoveryCredentials {
        let filled = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        let honeywell = match (filled(self.honeywell_email), filled(self.honeywell_password)) {
            (Some(username), Some(password)) => Some(PortalCredentials {
                username,
                password: SecretString::from(password),
            }),
            _ => None,
        };
        DiscoveryCredentials {
            honeywell,
            ring_token: filled(self.ring_token).map(SecretString::from),
        }
    }
}

fn to_values(devices: &[DeviceRecord]) -> Value {
    Value::Array(devices.iter().filter_map(|d| d.to_value().ok()).collect())
}

fn grouped(found: &BTreeMap<DeviceType, Vec<DeviceRecord>>) -> Value {
    let mut map = Map::new();
    for (device_type, devices) in found {
        map.insert(device_type.to_string(), to_values(devices));
    }
    Value::Object(map)
}

async fn rescan(app: &AppState, target: &str, save: bool) -> Result<DiscoveryResponse, GatewayError> {
    if target.eq_ignore_ascii_case("all") {
        let credentials = DiscoveryCredentials {
            honeywell: app.credentials.honeywell().await,
            ring_token: app.credentials.ring_token().await,
        };
        let found = app.discover_all(&credentials).await;
        let mut saved = None;
        if save {
            let mut total = 0;
            for (device_type, devices) in &found {
                total += app.save_discovered(*device_type, devices).await?;
            }
            saved = Some(total);
        }
        return Ok(DiscoveryResponse {
            success: true,
            devices: grouped(&found),
            saved,
            error: None,
        });
    }

    let device_type: DeviceType = target.parse()?;
    let devices = app.discover(device_type).await?;
    let saved = if save {
        Some(app.save_discovered(device_type, &devices).await?)
    } else {
        None
    };
    Ok(DiscoveryResponse {
        success: true,
        devices: to_values(&devices),
        saved,
        error: None,
    })
}

/// Re-run discovery for one type or `all`; merges into the inventory when `save` is set
pub async fn rescan_handler(
    State(state): State<Arc<ServerState>>,
    Path(target): Path<String>,
    body: Option<ApiJson<RescanRequest>>,
) -> Response {
    let save = body.map(|ApiJson(b)| b.save).unwrap_or(false);
    match rescan(&state.app, &target, save).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => soft_failure(e.to_string()),
    }
}

/// Discover one type and merge the result unless `?save=false`
pub async fn discover_type_handler(
    State(state): State<Arc<ServerState>>,
    Path(target): Path<String>,
    Query(query): Query<DiscoverQuery>,
) -> Result<Json<Value>, GatewayError> {
    let device_type: DeviceType = target.parse()?;
    let save = query.save.as_deref() != Some("false");

    let devices = state.app.discover(device_type).await?;
    if save && !devices.is_empty() {
        let saved = state.app.save_discovered(device_type, &devices).await?;
        info!("Saved {} {} device(s) to config", saved, device_type);
    }
    Ok(Json(to_values(&devices)))
}

/// Discover every type with credentials from the request body; nothing is saved
pub async fn discover_all_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(credentials): ApiJson<WizardCredentials>,
) -> Json<Value> {
    let found = state.app.discover_all(&credentials.into_discovery()).await;
    Json(grouped(&found))
}
