use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::Value;

use crate::errors::GatewayError;
use crate::server::state::ServerState;

/// Current observation and forecast
pub async fn weather_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.app.weather.current().await?))
}
