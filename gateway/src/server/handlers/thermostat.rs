//! Thermostat readings

use std::sync::Arc;

use axum::{extract::State, Json};
use gateway_api::models::ThermostatResponse;

use crate::server::state::ServerState;
use crate::session::adapter::{AggregateResult, Freshness};

fn response(success: bool) -> ThermostatResponse {
    ThermostatResponse {
        success,
        thermostats: Vec::new(),
        message: None,
        cached: None,
        stale: None,
        error: None,
    }
}

/// Current thermostat readings; cached within the freshness window and
/// stale when the portal is unavailable
pub async fn thermostat_handler(State(state): State<Arc<ServerState>>) -> Json<ThermostatResponse> {
    let result = state.app.thermostat_readings().await;

    let body = match result {
        AggregateResult::Ready {
            items, freshness, ..
        } => ThermostatResponse {
            thermostats: items,
            cached: (freshness == Freshness::Cached).then_some(true),
            stale: (freshness == Freshness::Stale).then_some(true),
            ..response(true)
        },
        AggregateResult::NotConfigured => {
            if state.app.config.snapshot().await.honeywell.is_empty() {
                ThermostatResponse {
                    message: Some("No thermostats configured".to_string()),
                    ..response(true)
                }
            } else {
                ThermostatResponse {
                    error: Some("Honeywell credentials not configured".to_string()),
                    ..response(false)
                }
            }
        }
        AggregateResult::Failed(error) => ThermostatResponse {
            error: Some(error),
            ..response(false)
        },
    };
    Json(body)
}
