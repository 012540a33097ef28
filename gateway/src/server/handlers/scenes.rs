use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::SceneResponse;
use tracing::info;

use crate::server::handlers::soft_failure;
use crate::server::state::ServerState;

/// Relay state a named scene applies, if the scene exists
pub fn scene_state(name: &str) -> Option<bool> {
    match name.to_lowercase().as_str() {
        "morning" => Some(true),
        "bedtime" | "movie" | "away" => Some(false),
        _ => None,
    }
}

/// Activate a scene by switching every relay
pub async fn scene_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Response {
    let Some(on) = scene_state(&name) else {
        return soft_failure("Unknown scene");
    };

    let devices = state.app.config.snapshot().await.shelly;
    let results = state.app.relays.set_all(&devices, on).await;
    info!(
        "Scene {} applied: {}/{} relays switched",
        name,
        results.iter().filter(|r| r.success).count(),
        results.len()
    );

    Json(SceneResponse {
        success: true,
        scene: name,
        devices: devices.len(),
    })
    .into_response()
}
