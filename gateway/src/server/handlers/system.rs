//! Health, version and setup status

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use gateway_api::models::{HealthResponse, SetupStatusResponse, SystemInfoResponse};

use crate::server::state::ServerState;
use crate::utils::{format_uptime, version_info};

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let config = state.app.config.snapshot().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: state.app.uptime().as_secs(),
        timestamp: Utc::now(),
        config: config.counts(),
    })
}

/// System info handler
pub async fn system_info_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    let config = state.app.config.snapshot().await;
    Json(SystemInfoResponse {
        success: true,
        version: state.app.version.clone(),
        git_hash: version.git_hash,
        build_time: version.build_time,
        config_version: config.version,
        uptime: format_uptime(state.app.uptime()),
        device_count: config.counts().total(),
    })
}

/// Setup status handler
pub async fn setup_status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let config_exists = state.app.config.exists().await;
    let config = state.app.config.snapshot().await;
    Json(SetupStatusResponse {
        needs_setup: !config_exists || config.needs_setup(),
        config_exists,
    })
}
