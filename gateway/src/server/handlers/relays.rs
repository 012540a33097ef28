//! Local relay status and switching

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::RelayStatusResponse;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::GatewayError;
use crate::models::device::DeviceRecord;
use crate::server::handlers::{key_from_value, parse_switch_state, soft_failure, ApiJson};
use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub device: Value,
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    #[serde(default)]
    pub state: Value,
}

fn switch_state(value: &Value) -> Result<bool, GatewayError> {
    parse_switch_state(value).ok_or_else(|| {
        GatewayError::ValidationError("state must be on/off or a boolean".to_string())
    })
}

fn in_room(devices: &[DeviceRecord], room: &str) -> Vec<DeviceRecord> {
    let room = room.to_lowercase();
    devices
        .iter()
        .filter(|d| d.room.as_deref().is_some_and(|r| r.to_lowercase() == room))
        .cloned()
        .collect()
}

async fn find_relay(state: &ServerState, key: &str) -> Option<DeviceRecord> {
    state
        .app
        .config
        .snapshot()
        .await
        .shelly
        .into_iter()
        .find(|d| d.matches_key(key))
}

/// Live status of every relay
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> Json<RelayStatusResponse> {
    let devices = state.app.config.snapshot().await.shelly;
    Json(RelayStatusResponse {
        success: true,
        devices: state.app.relays.status_all(&devices).await,
    })
}

/// Switch one relay addressed by `device` (id or ip)
pub async fn control_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<ControlRequest>,
) -> Result<Response, GatewayError> {
    let on = switch_state(&request.state)?;
    let Some(device) = key_from_value(&request.device) else {
        return Ok(soft_failure("Device not found"));
    };
    let Some(relay) = find_relay(&state, &device).await else {
        return Ok(soft_failure("Device not found"));
    };

    match state.app.relays.set(&relay, on).await {
        Ok(()) => Ok(Json(json!({ "success": true })).into_response()),
        Err(e) => Ok(soft_failure(e.to_string())),
    }
}

/// Switch every relay; individual failures do not fail the request
pub async fn all_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<SwitchRequest>,
) -> Result<Json<Value>, GatewayError> {
    let on = switch_state(&request.state)?;
    let devices = state.app.config.snapshot().await.shelly;
    let results = state.app.relays.set_all(&devices, on).await;
    Ok(Json(json!({ "success": true, "results": results })))
}

/// Switch every relay in a room (case-insensitive)
pub async fn room_handler(
    State(state): State<Arc<ServerState>>,
    Path(room): Path<String>,
    ApiJson(request): ApiJson<SwitchRequest>,
) -> Result<Response, GatewayError> {
    let on = switch_state(&request.state)?;
    let devices = in_room(&state.app.config.snapshot().await.shelly, &room);
    if devices.is_empty() {
        return Ok(soft_failure("No devices in room"));
    }

    state.app.relays.set_all(&devices, on).await;
    Ok(Json(json!({ "success": true, "devices": devices.len() })).into_response())
}

/// Switch one relay addressed by its path identity
pub async fn device_control_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SwitchRequest>,
) -> Result<Response, GatewayError> {
    let on = switch_state(&request.state)?;
    let Some(relay) = find_relay(&state, &id).await else {
        return Ok(soft_failure("Device not found"));
    };

    match state.app.relays.set(&relay, on).await {
        Ok(()) => Ok(Json(json!({ "success": true, "id": id, "state": on })).into_response()),
        Err(e) => Ok(soft_failure(e.to_string())),
    }
}

/// Switch a room and report every relay's outcome
pub async fn room_control_handler(
    State(state): State<Arc<ServerState>>,
    Path(room): Path<String>,
    ApiJson(request): ApiJson<SwitchRequest>,
) -> Result<Json<Value>, GatewayError> {
    let on = switch_state(&request.state)?;
    let devices = in_room(&state.app.config.snapshot().await.shelly, &room);
    let results = state.app.relays.set_all(&devices, on).await;
    Ok(Json(json!({ "success": true, "results": results })))
}
