//! In-dashboard settings: single-device edits, credentials, reset

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::{ApiStatus, RingSettingsResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::GatewayError;
use crate::inventory;
use crate::models::config::GatewaySettings;
use crate::models::device::{DeviceRecord, DeviceType};
use crate::server::handlers::{key_from_value, soft_failure, ApiJson};
use crate::server::state::ServerState;
use crate::storage::credentials::CredentialsPatch;

/// Confirmation token required by the reset endpoint
pub const RESET_CONFIRMATION: &str = "RESET";

#[derive(Debug, Deserialize)]
pub struct AddDeviceRequest {
    #[serde(rename = "type")]
    pub device_type: String,
    pub device: DeviceRecord,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    #[serde(rename = "type")]
    pub device_type: String,
    pub id: Value,
    #[serde(default)]
    pub updates: Value,
}

#[derive(Debug, Deserialize)]
pub struct RemoveDeviceRequest {
    #[serde(rename = "type")]
    pub device_type: String,
    pub id: Value,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingSettingsRequest {
    #[serde(default)]
    pub snapshot_interval: Option<Value>,
}

fn device_key(id: &Value) -> Result<String, GatewayError> {
    key_from_value(id).ok_or_else(|| GatewayError::ValidationError("Device id required".to_string()))
}

async fn config_response(state: &ServerState) -> Response {
    let config = state.app.config.snapshot().await;
    Json(json!({ "success": true, "config": config })).into_response()
}

/// Add a device
pub async fn add_device_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<AddDeviceRequest>,
) -> Result<Response, GatewayError> {
    let device_type: DeviceType = request.device_type.parse()?;
    state
        .app
        .config
        .update(|config| inventory::add(config.devices_mut(device_type), request.device))
        .await?;
    Ok(config_response(&state).await)
}

/// Update a device
pub async fn update_device_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<UpdateDeviceRequest>,
) -> Result<Response, GatewayError> {
    let device_type: DeviceType = request.device_type.parse()?;
    let key = device_key(&request.id)?;
    state
        .app
        .config
        .update(|config| {
            inventory::update(config.devices_mut(device_type), &key, &request.updates).map(|_| ())
        })
        .await?;
    Ok(config_response(&state).await)
}

/// Remove a device
pub async fn remove_device_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<RemoveDeviceRequest>,
) -> Result<Response, GatewayError> {
    let device_type: DeviceType = request.device_type.parse()?;
    let key = device_key(&request.id)?;
    state
        .app
        .config
        .update(|config| Ok(inventory::remove(config.devices_mut(device_type), &key)))
        .await?;
    Ok(config_response(&state).await)
}

/// RESTful device delete; 404 when the type or device is unknown
pub async fn delete_device_handler(
    State(state): State<Arc<ServerState>>,
    Path((device_type, id)): Path<(String, String)>,
) -> Result<Json<ApiStatus>, GatewayError> {
    let device_type: DeviceType = device_type
        .parse()
        .map_err(|_| GatewayError::NotFound("Device type not found".to_string()))?;

    state
        .app
        .config
        .update(|config| match inventory::remove(config.devices_mut(device_type), &id) {
            0 => Err(GatewayError::NotFound("Device not found".to_string())),
            _ => Ok(()),
        })
        .await?;
    Ok(Json(ApiStatus::ok()))
}

/// Patch credentials (both the legacy PUT and the POST route)
pub async fn update_credentials_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(patch): ApiJson<CredentialsPatch>,
) -> Result<Json<ApiStatus>, GatewayError> {
    state.app.update_credentials(patch).await?;
    Ok(Json(ApiStatus::ok_with_message("Credentials updated")))
}

/// Which providers have credentials; never the values themselves
pub async fn credential_status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.app.credentials.status().await)
}

/// Reset the inventory; requires `{confirm: "RESET"}`
pub async fn reset_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<ResetRequest>,
) -> Result<Response, GatewayError> {
    if request.confirm.as_deref() != Some(RESET_CONFIRMATION) {
        return Ok(soft_failure("Confirmation required"));
    }
    state.app.config.reset().await?;
    info!("Configuration reset");
    Ok(Json(ApiStatus::ok_with_message(
        "Configuration reset. Visit /setup to reconfigure.",
    ))
    .into_response())
}

/// Camera snapshot interval and configured cameras
pub async fn get_ring_settings_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let config = state.app.config.snapshot().await;
    let devices = config
        .ring
        .iter()
        .filter_map(|d| d.to_value().ok())
        .collect();
    Json(RingSettingsResponse {
        success: true,
        snapshot_interval: GatewaySettings::clamp_snapshot_interval(
            config.settings.ring_snapshot_interval,
        ),
        devices,
    })
}

/// Change the camera snapshot interval (clamped to 5..=300 seconds)
pub async fn update_ring_settings_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<RingSettingsRequest>,
) -> Result<Json<ApiStatus>, GatewayError> {
    let Some(raw) = request.snapshot_interval else {
        return Ok(Json(ApiStatus::ok()));
    };
    let secs = match &raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|secs| secs.is_finite())
    .ok_or_else(|| GatewayError::ValidationError("snapshotInterval must be a number".to_string()))?;

    let interval = GatewaySettings::clamp_snapshot_secs(secs);
    state
        .app
        .config
        .update(|config| {
            config.settings.ring_snapshot_interval = interval;
            Ok(())
        })
        .await?;
    Ok(Json(ApiStatus::ok()))
}
