//! Thermostat portal scraped over a cookie session
//!
//! The portal has no API. A session is seeded with `GET /portal/`, the login
//! form is posted, up to two redirects are followed, and each device's
//! control page is scraped for `Property.<name>, <value>` markers.

use async_trait::async_trait;
use gateway_api::models::Thermostat;
use http::Method;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::errors::GatewayError;
use crate::models::device::{DeviceId, DeviceRecord};
use crate::session::client::{Session, SessionState};
use crate::session::markers::{ExtractedFields, MarkerSet};
use crate::session::provider::SessionProvider;
use crate::session::transport::{UpstreamRequest, UpstreamResponse};
use crate::storage::credentials::PortalCredentials;

pub const PORTAL_BASE_URL: &str = "https://mytotalconnectcomfort.com/";

const LOGIN_PATH: &str = "/portal/";
const LOCATIONS_PATH: &str = "/portal/Location/GetLocationListData?page=1&filter=";
const MAX_REDIRECTS: usize = 2;
/// Minutes offset the login form expects
const TIME_OFFSET: &str = "300";

const MARKERS: &[&str] = &[
    "dispTemperature",
    "indoorHumidity",
    "heatSetpoint",
    "coolSetpoint",
    "outdoorTemp",
    "outdoorHumidity",
    "systemSwitchPosition",
    "statusHeat",
    "statusCool",
];

const MODES: [&str; 5] = ["EmHeat", "Heat", "Off", "Cool", "Auto"];

/// System mode for a `systemSwitchPosition` value
pub fn derive_mode(position: Option<f64>) -> &'static str {
    position
        .filter(|p| p.fract() == 0.0 && *p >= 0.0)
        .and_then(|p| MODES.get(p as usize).copied())
        .unwrap_or("Unknown")
}

/// Equipment status from the heat and cool status flags
pub fn derive_status(status_heat: Option<f64>, status_cool: Option<f64>) -> &'static str {
    let running = |v: Option<f64>| matches!(v, Some(s) if s == 1.0 || s == 2.0);
    if running(status_heat) {
        "Heating"
    } else if running(status_cool) {
        "Cooling"
    } else {
        "Idle"
    }
}

/// Target temperature: the heat setpoint unless it is absent or zero
pub fn derive_target(heat: Option<f64>, cool: Option<f64>) -> Option<f64> {
    heat.filter(|h| *h != 0.0).or(cool)
}

/// A location as listed by the portal, with its thermostats
#[derive(Debug, Clone, Deserialize)]
pub struct PortalLocation {
    #[serde(rename = "LocationID")]
    pub location_id: Value,
    #[serde(rename = "LocationName", alias = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Devices", default)]
    pub devices: Vec<PortalDevice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalDevice {
    #[serde(rename = "DeviceID")]
    pub device_id: DeviceId,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "DeviceType", default)]
    pub device_type: Option<Value>,
}

/// Scraped thermostat portal
pub struct ThermostatPortal {
    base: Url,
    markers: MarkerSet,
}

impl ThermostatPortal {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_base(Url::parse(PORTAL_BASE_URL)?)
    }

    pub fn with_base(base: Url) -> Result<Self, GatewayError> {
        Ok(Self {
            base,
            markers: MarkerSet::property_markers(MARKERS)?,
        })
    }

    fn request(&self, session: &Session, method: Method, path: &str) -> Result<UpstreamRequest, GatewayError> {
        let origin = self.base.origin().ascii_serialization();
        Ok(UpstreamRequest::new(method, session.url(path)?)
            .with_header("Accept", "text/html,application/xhtml+xml")
            .with_header("Origin", origin.clone())
            .with_header("Referer", format!("{}/portal/", origin)))
    }

    fn reading(&self, device: &DeviceRecord, fields: &ExtractedFields) -> Thermostat {
        Thermostat {
            id: device.id_value(),
            name: device.name.clone(),
            current_temp: fields.get("dispTemperature"),
            target_temp: derive_target(fields.get("heatSetpoint"), fields.get("coolSetpoint")),
            humidity: fields.get("indoorHumidity"),
            outdoor_temp: fields.get("outdoorTemp"),
            outdoor_humidity: fields.get("outdoorHumidity"),
            mode: derive_mode(fields.get("systemSwitchPosition")).to_string(),
            status: derive_status(fields.get("statusHeat"), fields.get("statusCool")).to_string(),
        }
    }

    /// Parse a scraped control page
    pub fn parse_page(&self, device: &DeviceRecord, page: &str) -> Thermostat {
        self.reading(device, &self.markers.extract(page))
    }

    /// Thermostats visible to a logged-in session
    pub async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceRecord>, GatewayError> {
        let request = self
            .request(session, Method::GET, LOCATIONS_PATH)?
            .with_header("X-Requested-With", "XMLHttpRequest");
        let response = session.send(request).await?;
        ensure_success(&response, "location list")?;
        Ok(parse_location_list(&response.text()))
    }
}

fn ensure_success(response: &UpstreamResponse, what: &str) -> Result<(), GatewayError> {
    if response.status.is_client_error() || response.status.is_server_error() {
        return Err(GatewayError::UpstreamError(format!(
            "{} returned {}",
            what, response.status
        )));
    }
    Ok(())
}

/// Device records from the location list. Falls back to scanning for
/// `DeviceID` values when the body is not the expected JSON.
pub fn parse_location_list(body: &str) -> Vec<DeviceRecord> {
    if let Ok(locations) = serde_json::from_str::<Vec<PortalLocation>>(body) {
        return locations
            .iter()
            .flat_map(|location| {
                location.devices.iter().map(move |device| {
                    let mut record = DeviceRecord {
                        id: Some(device.device_id.clone()),
                        name: device.name.clone(),
                        kind: Some("thermostat".to_string()),
                        ..Default::default()
                    };
                    record.extra.insert("locationId".to_string(), location.location_id.clone());
                    if let Some(name) = &location.name {
                        record.extra.insert("locationName".to_string(), Value::from(name.clone()));
                    }
                    record
                })
            })
            .collect();
    }

    let Ok(pattern) = regex::Regex::new(r#"DeviceID['":\s]+(\d+)"#) else {
        return Vec::new();
    };
    let mut records: Vec<DeviceRecord> = Vec::new();
    for capture in pattern.captures_iter(body) {
        let Some(id) = capture.get(1).and_then(|m| m.as_str().parse::<i64>().ok()) else {
            continue;
        };
        if records.iter().any(|r| r.id == Some(DeviceId::Number(id))) {
            continue;
        }
        records.push(DeviceRecord {
            id: Some(DeviceId::Number(id)),
            name: Some(format!("Thermostat {}", id)),
            kind: Some("thermostat".to_string()),
            ..Default::default()
        });
    }
    records
}

#[async_trait]
impl SessionProvider for ThermostatPortal {
    type Credentials = PortalCredentials;
    type Reading = Thermostat;

    fn name(&self) -> &'static str {
        "thermostat"
    }

    fn base_url(&self) -> &Url {
        &self.base
    }

    async fn login(&self, session: &Session, credentials: &PortalCredentials) -> Result<(), GatewayError> {
        let seed = session.send(self.request(session, Method::GET, LOGIN_PATH)?).await?;
        ensure_success(&seed, "portal seed")?;

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("timeOffset", TIME_OFFSET)
            .append_pair("UserName", &credentials.username)
            .append_pair("Password", credentials.password.expose_secret())
            .append_pair("RememberMe", "false")
            .finish();

        let mut submit = self.request(session, Method::POST, LOGIN_PATH)?;
        submit.form = Some(form);
        let response = session.send(submit).await?;
        ensure_success(&response, "login")?;

        if response.location.is_none() && session.cookies().is_empty() {
            return Err(GatewayError::AuthError(
                "portal rejected the login".to_string(),
            ));
        }

        session.set_state(SessionState::FollowingRedirects);
        let landing = session.follow_redirects(response, MAX_REDIRECTS).await?;
        debug!("Portal login landed with {}", landing.status);
        info!("Thermostat portal session established");
        Ok(())
    }

    async fn fetch(&self, session: &Session, device: &DeviceRecord) -> Result<Thermostat, GatewayError> {
        let id = device
            .id
            .as_ref()
            .ok_or_else(|| GatewayError::ValidationError("thermostat without id".to_string()))?;
        let path = format!("/portal/Device/Control/{}", id.canonical());
        let response = session.send(self.request(session, Method::GET, &path)?).await?;
        ensure_success(&response, "device page")?;
        Ok(self.parse_page(device, &response.text()))
    }

    fn placeholder(&self, device: &DeviceRecord, _error: &GatewayError) -> Thermostat {
        Thermostat {
            id: device.id_value(),
            name: device.name.clone(),
            current_temp: None,
            target_temp: None,
            humidity: None,
            outdoor_temp: None,
            outdoor_humidity: None,
            mode: "Unknown".to_string(),
            status: "Error".to_string(),
        }
    }

    fn is_valid(&self, reading: &Thermostat) -> bool {
        reading.current_temp.is_some()
    }
}
