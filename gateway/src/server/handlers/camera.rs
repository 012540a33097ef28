//! Camera snapshots and camera listing

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::SnapshotResponse;
use serde_json::{json, Value};

use crate::errors::GatewayError;
use crate::server::handlers::soft_failure;
use crate::server::state::ServerState;
use crate::session::adapter::{AggregateResult, Freshness};

const NOT_CONFIGURED: &str = "Ring not configured";

/// Snapshot of every configured camera. The top-level `snapshot`, `battery`
/// and `wifi` describe the first camera.
pub async fn snapshot_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.app.camera_snapshots().await {
        AggregateResult::Ready {
            items, freshness, ..
        } => {
            let first = items.first();
            let snapshot = first.and_then(|c| c.snapshot.clone());
            let battery = first.and_then(|c| c.battery);
            let wifi = first.and_then(|c| c.wifi);
            Json(SnapshotResponse {
                success: true,
                snapshot,
                battery,
                wifi,
                cached: (freshness == Freshness::Cached).then_some(true),
                stale: (freshness == Freshness::Stale).then_some(true),
                cameras: items,
                error: None,
            })
            .into_response()
        }
        AggregateResult::NotConfigured => soft_failure(NOT_CONFIGURED),
        AggregateResult::Failed(error) => soft_failure(error),
    }
}

/// Cameras visible to the stored refresh token
pub async fn ring_devices_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Response, GatewayError> {
    let Some(token) = state.app.credentials.ring_token().await else {
        return Ok(soft_failure(NOT_CONFIGURED));
    };

    let session = state.app.cameras.login_session(&token).await?;
    let devices: Vec<Value> = state
        .app
        .cameras
        .provider()
        .list_devices(&session)
        .await?
        .into_iter()
        .map(|record| {
            json!({
                "id": record.id_value(),
                "name": record.name,
                "type": record.kind,
                "batteryLevel": record.extra.get("batteryLevel").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "devices": devices })).into_response())
}
