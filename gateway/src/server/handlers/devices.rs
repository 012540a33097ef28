//! Unified device list and bulk user-field edits

use std::sync::Arc;

use axum::{extract::State, Json};
use futures::future::join_all;
use gateway_api::models::{ApiStatus, DevicesResponse, UnifiedDevice};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::GatewayError;
use crate::inventory::{apply_user_edits, UserEdit};
use crate::models::device::{DeviceRecord, DeviceType};
use crate::server::handlers::ApiJson;
use crate::server::state::ServerState;
use crate::vendors::shelly::RelayClient;

const UNASSIGNED_ROOM: &str = "Unassigned";
const DEFAULT_RELAY_ICON: &str = "💡";

#[derive(Debug, Default, Deserialize)]
pub struct DeviceEditsRequest {
    #[serde(default)]
    pub shelly: Option<Vec<UserEdit>>,
    #[serde(default)]
    pub honeywell: Option<Vec<UserEdit>>,
}

async fn relay_entry(relays: &RelayClient, record: &DeviceRecord) -> UnifiedDevice {
    let reading = relays.status(record).await.ok();
    UnifiedDevice {
        id: record.id_value(),
        name: record.display_name().unwrap_or_default(),
        device_type: DeviceType::Shelly.to_string(),
        room: Some(
            record
                .room
                .clone()
                .unwrap_or_else(|| UNASSIGNED_ROOM.to_string()),
        ),
        icon: Some(
            record
                .icon
                .clone()
                .unwrap_or_else(|| DEFAULT_RELAY_ICON.to_string()),
        ),
        ip: record.ip.clone(),
        gen: Some(record.gen.unwrap_or(1)),
        capabilities: vec!["switch".to_string(), "power-meter".to_string()],
        state: Some(reading.is_some_and(|r| r.on)),
        power: Some(reading.map(|r| r.power).unwrap_or(0.0)),
        online: reading.is_some(),
    }
}

fn thermostat_entry(record: &DeviceRecord) -> UnifiedDevice {
    let id = record.id_value();
    let name = record.name.clone().unwrap_or_else(|| match &record.id {
        Some(id) => format!("Thermostat {}", id),
        None => "Thermostat".to_string(),
    });
    UnifiedDevice {
        id,
        name,
        device_type: DeviceType::Honeywell.to_string(),
        room: None,
        icon: None,
        ip: None,
        gen: None,
        capabilities: vec!["thermostat".to_string()],
        state: None,
        power: None,
        online: true,
    }
}

/// Relays (with live status) and thermostats in one list
pub async fn devices_handler(State(state): State<Arc<ServerState>>) -> Json<DevicesResponse> {
    let config = state.app.config.snapshot().await;
    let relays = &state.app.relays;

    let mut devices = join_all(config.shelly.iter().map(|r| relay_entry(relays, r))).await;
    devices.extend(config.honeywell.iter().map(thermostat_entry));

    Json(DevicesResponse {
        success: true,
        devices,
    })
}

/// Apply name/room/icon edits to relays and name edits to thermostats
pub async fn device_config_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<DeviceEditsRequest>,
) -> Result<Json<ApiStatus>, GatewayError> {
    let thermostat_edits: Option<Vec<UserEdit>> = request.honeywell.map(|edits| {
        edits
            .into_iter()
            .map(|edit| UserEdit {
                name: edit.name,
                id: edit.id,
                ..Default::default()
            })
            .collect()
    });

    state
        .app
        .config
        .update(|config| {
            if let Some(edits) = &request.shelly {
                apply_user_edits(&mut config.shelly, edits);
            }
            if let Some(edits) = &thermostat_edits {
                apply_user_edits(&mut config.honeywell, edits);
            }
            Ok(())
        })
        .await?;
    Ok(Json(ApiStatus::ok()))
}

/// Distinct relay rooms
pub async fn rooms_handler(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let rooms = state.app.config.snapshot().await.rooms();
    Json(json!({ "success": true, "rooms": rooms }))
}
