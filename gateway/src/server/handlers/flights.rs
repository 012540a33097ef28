//! Aircraft feed and flight-tracking configuration

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use gateway_api::models::FlightTrackingStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::server::handlers::soft_failure;
use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct TestFeedQuery {
    #[serde(default)]
    pub url: Option<String>,
}

/// Aircraft from the configured source; never fails, errors ride in the feed document
pub async fn aircraft_handler(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let config = state.app.config.snapshot().await;
    Json(state.app.flights.aircraft(&config).await)
}

/// Flight-tracking settings and configured receivers
pub async fn flight_tracking_status_handler(
    State(state): State<Arc<ServerState>>,
) -> Json<FlightTrackingStatus> {
    let config = state.app.config.snapshot().await;
    let tracking = &config.flight_tracking;
    Json(FlightTrackingStatus {
        enabled: tracking.enabled,
        source: tracking.source.clone().unwrap_or_else(|| "auto".to_string()),
        url: tracking.url.clone(),
        piaware: config
            .piaware
            .iter()
            .filter_map(|r| r.to_value().ok())
            .collect(),
    })
}

/// Probe a receiver URL and report how many aircraft it sees
pub async fn test_feed_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TestFeedQuery>,
) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return soft_failure("No URL provided");
    };

    match state.app.flights.test_feed(url.trim()).await {
        Ok(aircraft) => Json(json!({ "success": true, "aircraft": aircraft })).into_response(),
        Err(e) => {
            warn!("Feed test for {} failed: {}", url, e);
            soft_failure(e.to_string())
        }
    }
}
