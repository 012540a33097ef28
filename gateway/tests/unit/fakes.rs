//! Scripted upstreams for the session adapters

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode};
use url::Url;

use nexus_gateway::errors::GatewayError;
use nexus_gateway::models::device::DeviceRecord;
use nexus_gateway::providers::{CameraCloud, ThermostatPortal};
use nexus_gateway::session::transport::{Transport, UpstreamRequest, UpstreamResponse};
use nexus_gateway::storage::credentials::PortalCredentials;

pub const PORTAL_BASE: &str = "http://portal.test/";
pub const CAMERA_API_BASE: &str = "http://cameras.test/clients_api/";
pub const CAMERA_OAUTH: &str = "http://cameras.test/oauth/token";

fn response(status: StatusCode, body: impl Into<Vec<u8>>) -> UpstreamResponse {
    UpstreamResponse {
        status,
        location: None,
        set_cookies: Vec::new(),
        body: body.into(),
    }
}

pub fn portal() -> ThermostatPortal {
    ThermostatPortal::with_base(Url::parse(PORTAL_BASE).unwrap()).unwrap()
}

pub fn camera_cloud() -> CameraCloud {
    CameraCloud::with_urls(
        Url::parse(CAMERA_API_BASE).unwrap(),
        Url::parse(CAMERA_OAUTH).unwrap(),
    )
    .unwrap()
}

pub fn portal_credentials(username: &str) -> PortalCredentials {
    PortalCredentials {
        username: username.to_string(),
        password: "hunter2".to_string().into(),
    }
}

pub fn thermostats(ids: &[i64]) -> Vec<DeviceRecord> {
    ids.iter()
        .map(|id| {
            serde_json::from_value(serde_json::json!({ "id": id, "name": format!("T{}", id) }))
                .unwrap()
        })
        .collect()
}

/// Thermostat portal: cookie login with a redirect, then one control page per device
#[derive(Default)]
pub struct FakePortal {
    pub logins: AtomicUsize,
    pub page_fetches: AtomicUsize,
    pub reject_login: AtomicBool,
    /// Every device page fails while set
    pub pages_down: AtomicBool,
    /// Reported `dispTemperature`
    pub temperature: AtomicI64,
    /// Device ids whose page fails
    pub failing: Mutex<HashSet<String>>,
    /// Device ids whose page hangs for `slow_delay`
    pub slow: Mutex<HashSet<String>>,
    pub slow_delay: Mutex<Duration>,
    pub usernames: Mutex<Vec<String>>,
}

impl FakePortal {
    pub fn new() -> Arc<Self> {
        let portal = Self::default();
        portal.temperature.store(70, Ordering::SeqCst);
        Arc::new(portal)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn fail_device(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn slow_device(&self, id: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(id.to_string());
        *self.slow_delay.lock().unwrap() = delay;
    }

    fn control_page(&self) -> String {
        format!(
            "Control.Model.Property.dispTemperature, {});\n\
             Control.Model.Property.heatSetpoint, 68);\n\
             Control.Model.Property.coolSetpoint, 76);\n\
             Control.Model.Property.indoorHumidity, 40);\n\
             Control.Model.Property.systemSwitchPosition, 1);\n\
             Control.Model.Property.statusHeat, 1);",
            self.temperature.load(Ordering::SeqCst)
        )
    }
}

#[async_trait]
impl Transport for FakePortal {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        let path = request.url.path().to_string();

        if path == "/portal/" && request.method == Method::GET {
            let mut seed = response(StatusCode::OK, "<form></form>");
            seed.set_cookies = vec!["ASP.NET_SessionId=seed; path=/".to_string()];
            return Ok(seed);
        }

        if path == "/portal/" && request.method == Method::POST {
            self.logins.fetch_add(1, Ordering::SeqCst);
            let form = request.form.unwrap_or_default();
            let username = url::form_urlencoded::parse(form.as_bytes())
                .find(|(k, _)| k == "UserName")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            self.usernames.lock().unwrap().push(username);

            if self.reject_login.load(Ordering::SeqCst) {
                return Ok(response(StatusCode::UNAUTHORIZED, "denied"));
            }
            let mut redirect = response(StatusCode::FOUND, "");
            redirect.location = Some("/portal/Locations".to_string());
            redirect.set_cookies = vec![".ASPXAUTH=token; path=/".to_string()];
            return Ok(redirect);
        }

        if path == "/portal/Locations" {
            return Ok(response(StatusCode::OK, "<html>home</html>"));
        }

        if path == "/portal/Location/GetLocationListData" {
            let body = r#"[{"LocationID": 9, "Name": "Home",
                "Devices": [{"DeviceID": 101, "Name": "Upstairs"}, {"DeviceID": 102, "Name": "Downstairs"}]}]"#;
            return Ok(response(StatusCode::OK, body));
        }

        if let Some(id) = path.strip_prefix("/portal/Device/Control/") {
            self.page_fetches.fetch_add(1, Ordering::SeqCst);
            if request.cookie.as_deref().map_or(true, |c| !c.contains(".ASPXAUTH")) {
                return Ok(response(StatusCode::UNAUTHORIZED, "login required"));
            }
            let delay = self
                .slow
                .lock()
                .unwrap()
                .contains(id)
                .then(|| *self.slow_delay.lock().unwrap());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.pages_down.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(id) {
                return Ok(response(StatusCode::INTERNAL_SERVER_ERROR, "error"));
            }
            return Ok(response(StatusCode::OK, self.control_page()));
        }

        Ok(response(StatusCode::NOT_FOUND, "not found"))
    }
}

/// Camera cloud: refresh-token exchange, snapshot bytes and health
#[derive(Default)]
pub struct FakeCameraCloud {
    pub exchanges: AtomicUsize,
}

impl FakeCameraCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Transport for FakeCameraCloud {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        let path = request.url.path().to_string();

        if path == "/oauth/token" {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            return Ok(response(StatusCode::OK, r#"{"access_token":"access-1"}"#));
        }
        if request.bearer.as_deref() != Some("access-1") {
            return Ok(response(StatusCode::UNAUTHORIZED, ""));
        }
        if path == "/clients_api/ring_devices" {
            let body = r#"{"doorbots":[{"id":11,"description":"Front Door","battery_life":"87"}],
                "authorized_doorbots":[],
                "stickup_cams":[{"id":12,"description":"Garage","kind":"stickup_cam"}]}"#;
            return Ok(response(StatusCode::OK, body));
        }
        if path.starts_with("/clients_api/snapshots/image/") {
            return Ok(response(StatusCode::OK, vec![0xFF, 0xD8, 0xFF]));
        }
        if path.ends_with("/health") {
            let body = r#"{"device_health":{"battery_percentage":"90","latest_signal_strength":-52}}"#;
            return Ok(response(StatusCode::OK, body));
        }
        Ok(response(StatusCode::NOT_FOUND, ""))
    }
}
