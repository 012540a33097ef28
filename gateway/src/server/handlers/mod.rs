//! HTTP request handlers
//!
//! Every failure answers `{success: false, error}`; upstream trouble never
//! turns into a panic or an empty body.

pub mod camera;
pub mod config;
pub mod devices;
pub mod discovery;
pub mod flights;
pub mod relays;
pub mod scenes;
pub mod settings;
pub mod system;
pub mod thermostat;
pub mod weather;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, OptionalFromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::ApiStatus;
use serde_json::Value;
use tracing::error;

use crate::errors::GatewayError;

impl GatewayError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ValidationError(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AuthError(_)
            | GatewayError::SessionError(_)
            | GatewayError::UpstreamError(_)
            | GatewayError::HttpError(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(ApiStatus::failed(self.to_string()))).into_response()
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::ValidationError(rejection.body_text())
    }
}

/// [`Json`] body extractor whose rejections use the `{success: false, error}` shape
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T, S> OptionalFromRequest<S> for ApiJson<T>
where
    Json<T>: OptionalFromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let value = <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(value.map(|Json(value)| Self(value)))
    }
}

/// `{success: false, error}` with a 200 status, for expected conditions
/// the dashboard renders inline (e.g. a provider that is not configured)
pub fn soft_failure(message: impl Into<String>) -> Response {
    Json(ApiStatus::failed(message)).into_response()
}

/// Interpret a relay command `state`: booleans, `"on"`/`"off"`, `"true"`/`"false"`, `1`/`0`
pub fn parse_switch_state(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(on) => Some(*on),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "on" | "true" | "1" => Some(true),
            "off" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Canonical identity string from a JSON id (number or string)
pub fn key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
