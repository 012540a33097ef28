//! Whole-document config read and replace

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use gateway_api::models::ApiStatus;
use serde_json::Value;

use crate::errors::GatewayError;
use crate::server::handlers::ApiJson;
use crate::server::state::ServerState;
use crate::storage::config::parse_config;
use crate::storage::credentials::CredentialsPatch;

/// Get current configuration
pub async fn get_config_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.app.config.snapshot().await)
}

/// Replace the configuration. A `credentials` object in the body is split
/// off and applied to the credential store instead. Nothing is written
/// unless both parts are valid.
pub async fn save_config_handler(
    State(state): State<Arc<ServerState>>,
    ApiJson(mut body): ApiJson<Value>,
) -> Result<Json<ApiStatus>, GatewayError> {
    let Value::Object(fields) = &mut body else {
        return Err(GatewayError::ValidationError(
            "Config must be a JSON object".to_string(),
        ));
    };

    let patch = fields
        .remove("credentials")
        .map(serde_json::from_value::<CredentialsPatch>)
        .transpose()
        .map_err(|e| GatewayError::ValidationError(format!("Invalid credentials: {}", e)))?;
    let config = parse_config(body)?;

    if let Some(patch) = patch {
        state.app.update_credentials(patch).await?;
    }
    state.app.config.save(config).await?;
    Ok(Json(ApiStatus::ok()))
}
