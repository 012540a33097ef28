//! HTTP API tests over the full router with scripted cloud upstreams

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use nexus_gateway::app::options::{AppOptions, FlightOptions, StorageOptions};
use nexus_gateway::app::state::{AppState, Components};
use nexus_gateway::server::serve::build_router;
use nexus_gateway::server::state::ServerState;
use nexus_gateway::storage::credentials::EnvCredentials;
use nexus_gateway::storage::layout::StorageLayout;
use nexus_gateway::vendors::WeatherClient;

use crate::fakes::{camera_cloud, portal, FakeCameraCloud, FakePortal};

struct Harness {
    router: Router,
    app: Arc<AppState>,
    portal: Arc<FakePortal>,
    cameras: Arc<FakeCameraCloud>,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let options = AppOptions {
            storage: StorageOptions {
                layout: StorageLayout::new(dir.path()),
            },
            flights: FlightOptions {
                local_feed_path: dir.path().join("aircraft.json"),
            },
            ..Default::default()
        };

        let fake_portal = FakePortal::new();
        let fake_cameras = FakeCameraCloud::new();
        let components = Components {
            portal: portal(),
            portal_transport: fake_portal.clone(),
            camera: camera_cloud(),
            camera_transport: fake_cameras.clone(),
            weather: WeatherClient::with_urls("http://127.0.0.1:9/obs", "http://127.0.0.1:9/forecast")
                .unwrap(),
            env: EnvCredentials::default(),
        };

        let app = Arc::new(
            AppState::assemble("test".to_string(), &options, components)
                .await
                .unwrap(),
        );
        let router = build_router(Arc::new(ServerState::new(Arc::clone(&app))));
        Self {
            router,
            app,
            portal: fake_portal,
            cameras: fake_cameras,
            _dir: dir,
        }
    }

    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, body.map(|body| body.to_string())).await
    }

    async fn send(&self, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(body)).await
    }

    async fn with_thermostats(&self) {
        self.post(
            "/api/settings/device",
            json!({ "type": "honeywell", "device": { "id": 101, "name": "Upstairs" } }),
        )
        .await;
        self.call(
            "PUT",
            "/api/settings/credentials",
            Some(json!({ "honeywellEmail": "me@example.com", "honeywellPassword": "hunter2" })),
        )
        .await;
    }
}

#[tokio::test]
async fn test_health_and_setup_status() {
    let h = Harness::new().await;

    let (status, body) = h.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["config"]["shelly"], 0);

    let (_, body) = h.get("/api/setup-status").await;
    assert_eq!(body, json!({ "needsSetup": true, "configExists": true }));

    let (_, body) = h.get("/api/system/info").await;
    assert_eq!(body["version"], "test");
    assert_eq!(body["deviceCount"], 0);
}

#[tokio::test]
async fn test_device_crud_and_rooms() {
    let h = Harness::new().await;

    let (status, body) = h
        .post(
            "/api/settings/device",
            json!({ "type": "shelly", "device": { "id": "s1", "ip": "10.0.0.2", "room": "Kitchen" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["shelly"][0]["id"], "s1");

    let (status, _) = h
        .post(
            "/api/settings/device",
            json!({ "type": "shelly", "device": { "id": "s1" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h
        .call(
            "PUT",
            "/api/settings/device",
            Some(json!({ "type": "shelly", "id": "s1", "updates": { "room": "Office" } })),
        )
        .await;
    assert_eq!(body["config"]["shelly"][0]["room"], "Office");

    let (_, body) = h.get("/api/rooms").await;
    assert_eq!(body, json!({ "success": true, "rooms": ["Office"] }));

    let (status, _) = h.call("DELETE", "/api/devices/shelly/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.call("DELETE", "/api/devices/shelly/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(h.app.config.snapshot().await.shelly.is_empty());
}

#[tokio::test]
async fn test_bulk_user_edits() {
    let h = Harness::new().await;
    h.post(
        "/api/settings/device",
        json!({ "type": "honeywell", "device": { "id": 101, "name": "Old" } }),
    )
    .await;

    let (_, body) = h
        .post(
            "/api/devices/config",
            json!({ "honeywell": [{ "id": "101", "name": "Hall", "room": "ignored" }] }),
        )
        .await;
    assert_eq!(body["success"], true);

    let config = h.app.config.snapshot().await;
    assert_eq!(config.honeywell[0].name.as_deref(), Some("Hall"));
    assert_eq!(config.honeywell[0].room, None);
}

#[tokio::test]
async fn test_reset_requires_confirmation() {
    let h = Harness::new().await;
    h.with_thermostats().await;

    let (_, body) = h.post("/api/settings/reset", json!({})).await;
    assert_eq!(body["success"], false);
    assert_eq!(h.app.config.snapshot().await.honeywell.len(), 1);

    let (_, body) = h.post("/api/settings/reset", json!({ "confirm": "RESET" })).await;
    assert_eq!(body["success"], true);
    assert!(h.app.config.snapshot().await.honeywell.is_empty());
}

#[tokio::test]
async fn test_credential_status_hides_secrets() {
    let h = Harness::new().await;
    h.with_thermostats().await;

    let (_, body) = h.get("/api/settings/credentials/status").await;
    assert_eq!(
        body,
        json!({
            "honeywell": { "configured": true, "email": "me@example.com" },
            "ring": false,
            "shelly": false
        })
    );
    assert!(!body.to_string().contains("hunter2"));

    let (_, config) = h.get("/api/config").await;
    assert!(!config.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_thermostats_are_cached_then_invalidated() {
    let h = Harness::new().await;

    let (_, body) = h.get("/api/thermostat").await;
    assert_eq!(
        body,
        json!({ "success": true, "thermostats": [], "message": "No thermostats configured" })
    );

    h.with_thermostats().await;

    let (_, body) = h.get("/api/thermostat").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["thermostats"][0]["currentTemp"], 70.0);
    assert_eq!(body["thermostats"][0]["name"], "Upstairs");
    assert!(body.get("cached").is_none());

    let (_, body) = h.get("/api/thermostat").await;
    assert_eq!(body["cached"], true);
    assert_eq!(h.portal.logins(), 1);

    // New credentials drop the cache and the session
    h.post("/api/credentials", json!({ "honeywellPassword": "changed" }))
        .await;
    let (_, body) = h.get("/api/thermostat").await;
    assert!(body.get("cached").is_none());
    assert!(body.get("stale").is_none());
    assert_eq!(h.portal.logins(), 2);
}

#[tokio::test]
async fn test_credential_write_between_read_and_fetch() {
    let h = Harness::new().await;
    h.with_thermostats().await;

    // Same order as a thermostat request: pin the generation, read credentials
    let ticket = h.app.thermostats.begin();
    let old = h.app.credentials.honeywell().await;
    let devices = h.app.config.snapshot().await.honeywell;

    let (status, _) = h
        .call(
            "PUT",
            "/api/settings/credentials",
            Some(json!({ "honeywellEmail": "new@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    h.app
        .thermostats
        .fetch_all_in(ticket, &devices, old.as_ref())
        .await;

    let (_, body) = h.get("/api/thermostat").await;
    assert_eq!(body["success"], true);
    assert_ne!(body["cached"], json!(true));
    assert_eq!(h.portal.logins(), 2);
    assert_eq!(
        h.portal.usernames.lock().unwrap().last().map(String::as_str),
        Some("new@example.com")
    );
}

#[tokio::test]
async fn test_thermostat_without_credentials() {
    let h = Harness::new().await;
    h.post(
        "/api/settings/device",
        json!({ "type": "honeywell", "device": { "id": 101 } }),
    )
    .await;

    let (_, body) = h.get("/api/thermostat").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Honeywell credentials not configured");
}

#[tokio::test]
async fn test_config_post_routes_credentials_to_store() {
    let h = Harness::new().await;
    let (_, mut config) = h.get("/api/config").await;
    config["credentials"] = json!({ "ringToken": "refresh" });
    config["settings"]["theme"] = json!("light");

    let (_, body) = h.post("/api/config", config).await;
    assert_eq!(body["success"], true);

    let (_, stored) = h.get("/api/config").await;
    assert_eq!(stored["settings"]["theme"], "light");
    assert!(stored.get("credentials").is_none());
    assert!(h.app.credentials.status().await.ring);
}

#[tokio::test]
async fn test_invalid_config_post_leaves_credentials_alone() {
    let h = Harness::new().await;
    let generation = h.app.cameras.generation_id();

    let (status, body) = h
        .post(
            "/api/config",
            json!({ "shelly": "not a list", "credentials": { "ringToken": "refresh" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert!(!h.app.credentials.status().await.ring);
    assert_eq!(h.app.cameras.generation_id(), generation);
    assert_eq!(h.app.config.snapshot().await.shelly.len(), 0);
}

#[tokio::test]
async fn test_rejected_bodies_use_failure_shape() {
    let h = Harness::new().await;

    let (status, body) = h
        .send("POST", "/api/shelly/control", Some("{ not json".to_string()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = h.post("/api/settings/reset", json!({ "confirm": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_camera_snapshot_and_listing() {
    let h = Harness::new().await;

    let (_, body) = h.get("/api/ring/snapshot").await;
    assert_eq!(body, json!({ "success": false, "error": "Ring not configured" }));

    h.post("/api/credentials", json!({ "ringToken": "refresh" })).await;
    h.post(
        "/api/settings/device",
        json!({ "type": "ring", "device": { "id": 11, "name": "Front Door" } }),
    )
    .await;

    let (_, body) = h.get("/api/ring/snapshot").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["snapshot"], "/9j/");
    assert_eq!(body["battery"], 90.0);
    assert_eq!(body["cameras"][0]["status"], "OK");

    let (_, body) = h.get("/api/ring/devices").await;
    assert_eq!(body["devices"][0]["type"], "doorbell");
    assert_eq!(body["devices"][0]["batteryLevel"], 87.0);
    assert_eq!(body["devices"][1]["type"], "camera");
    assert_eq!(h.cameras.exchanges.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ring_settings_are_clamped() {
    let h = Harness::new().await;

    h.post("/api/ring/settings", json!({ "snapshotInterval": 1 })).await;
    let (_, body) = h.get("/api/ring/settings").await;
    assert_eq!(body["snapshotInterval"], 5);

    h.post("/api/ring/settings", json!({ "snapshotInterval": "9000" })).await;
    let (_, body) = h.get("/api/ring/settings").await;
    assert_eq!(body["snapshotInterval"], 300);

    h.post("/api/ring/settings", json!({ "snapshotInterval": -40.5 })).await;
    let (_, body) = h.get("/api/ring/settings").await;
    assert_eq!(body["snapshotInterval"], 5);
}

#[tokio::test]
async fn test_discovery_saves_unless_disabled() {
    let h = Harness::new().await;
    h.call(
        "PUT",
        "/api/settings/credentials",
        Some(json!({ "honeywellEmail": "me@example.com", "honeywellPassword": "hunter2" })),
    )
    .await;

    let (status, _) = h.get("/api/discover/toaster").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h.get("/api/discover/honeywell?save=false").await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert!(h.app.config.snapshot().await.honeywell.is_empty());

    h.get("/api/discover/honeywell").await;
    h.get("/api/discover/honeywell").await;
    let config = h.app.config.snapshot().await;
    assert_eq!(config.honeywell.len(), 2);
    assert_eq!(config.honeywell[0].name.as_deref(), Some("Upstairs"));
}

#[tokio::test]
async fn test_rescan_reports_missing_credentials() {
    let h = Harness::new().await;

    let (_, body) = h.post("/api/settings/rescan/ring", json!({ "save": true })).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Configuration error: Ring not configured");

    let (_, body) = h.post("/api/settings/rescan/gizmo", json!({})).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_aircraft_disabled_and_unknown_scene() {
    let h = Harness::new().await;

    let (_, body) = h.get("/api/aircraft").await;
    assert_eq!(body["disabled"], true);
    assert_eq!(body["aircraft"], json!([]));

    let (_, body) = h.get("/api/flight-tracking/status").await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["source"], "auto");

    let (_, body) = h.post("/api/scene/party", json!({})).await;
    assert_eq!(body, json!({ "success": false, "error": "Unknown scene" }));

    let (_, body) = h.post("/api/scene/away", json!({})).await;
    assert_eq!(body, json!({ "success": true, "scene": "away", "devices": 0 }));
}

#[tokio::test]
async fn test_relay_commands_without_devices() {
    let h = Harness::new().await;

    let (_, body) = h
        .post("/api/shelly/control", json!({ "device": "nope", "state": true }))
        .await;
    assert_eq!(body, json!({ "success": false, "error": "Device not found" }));

    let (_, body) = h.post("/api/shelly/room/attic", json!({ "state": "on" })).await;
    assert_eq!(body["error"], "No devices in room");

    let (status, _) = h.post("/api/shelly/all", json!({ "state": "dim" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h.get("/api/devices").await;
    assert_eq!(body, json!({ "success": true, "devices": [] }));
}
