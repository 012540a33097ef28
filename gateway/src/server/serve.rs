//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::GatewayError;
use crate::server::handlers::{
    camera, config, devices, discovery, flights, relays, scenes, settings, system, thermostat,
    weather,
};
use crate::server::state::ServerState;

/// All API routes with their middleware
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // System
        .route("/api/health", get(system::health_handler))
        .route("/api/system/info", get(system::system_info_handler))
        .route("/api/setup-status", get(system::setup_status_handler))
        // Config and settings
        .route(
            "/api/config",
            get(config::get_config_handler).post(config::save_config_handler),
        )
        .route(
            "/api/settings/device",
            post(settings::add_device_handler)
                .put(settings::update_device_handler)
                .delete(settings::remove_device_handler),
        )
        .route(
            "/api/settings/credentials",
            put(settings::update_credentials_handler),
        )
        .route("/api/credentials", post(settings::update_credentials_handler))
        .route(
            "/api/settings/credentials/status",
            get(settings::credential_status_handler),
        )
        .route("/api/settings/reset", post(settings::reset_handler))
        .route(
            "/api/settings/rescan/{type}",
            post(discovery::rescan_handler),
        )
        // Discovery
        .route("/api/discover", post(discovery::discover_all_handler))
        .route("/api/discover/{type}", get(discovery::discover_type_handler))
        // Thermostats
        .route("/api/thermostat", get(thermostat::thermostat_handler))
        // Cameras
        .route("/api/ring/snapshot", get(camera::snapshot_handler))
        .route("/api/ring/devices", get(camera::ring_devices_handler))
        .route(
            "/api/ring/settings",
            get(settings::get_ring_settings_handler).post(settings::update_ring_settings_handler),
        )
        // Relays
        .route("/api/shelly/status", get(relays::status_handler))
        .route("/api/shelly/control", post(relays::control_handler))
        .route("/api/shelly/all", post(relays::all_handler))
        .route("/api/shelly/room/{room}", post(relays::room_handler))
        // Unified devices
        .route("/api/devices", get(devices::devices_handler))
        .route("/api/devices/config", post(devices::device_config_handler))
        .route(
            "/api/devices/room/{room}/control",
            post(relays::room_control_handler),
        )
        .route(
            "/api/devices/{target}/control",
            post(relays::device_control_handler),
        )
        .route(
            "/api/devices/{target}/{id}",
            delete(settings::delete_device_handler),
        )
        .route("/api/rooms", get(devices::rooms_handler))
        // Flights and weather
        .route("/api/aircraft", get(flights::aircraft_handler))
        .route(
            "/api/flight-tracking/status",
            get(flights::flight_tracking_status_handler),
        )
        .route("/api/test-piaware", get(flights::test_feed_handler))
        .route("/api/weather", get(weather::weather_handler))
        // Scenes
        .route("/api/scene/{name}", post(scenes::scene_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), GatewayError>>, GatewayError> {
    let app = build_router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))
    });

    Ok(handle)
}
