//! Flight-tracking feed (dump1090 `aircraft.json`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::models::config::{Config, FlightSource};
use crate::models::device::{DeviceId, DevicePort, DeviceRecord};

/// Where a receiver on this host writes its feed
pub const LOCAL_FEED_PATH: &str = "/run/dump1090-fa/aircraft.json";
const FEED_SUFFIX: &str = "/data/aircraft.json";
const DEFAULT_RECEIVER_PORT: u16 = 8080;
/// Ports tried when probing a host for a receiver
pub const PROBE_PORTS: [u16; 3] = [8080, 80, 8888];

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Append the feed path to a receiver URL unless it already has it
pub fn feed_url(base: &str) -> String {
    if base.contains(FEED_SUFFIX) {
        base.to_string()
    } else {
        format!("{}{}", base.trim_end_matches('/'), FEED_SUFFIX)
    }
}

/// Feed file of a receiver that writes to this host's filesystem
pub fn receiver_file(record: &DeviceRecord) -> Option<PathBuf> {
    let path = record.extra.get("path").and_then(Value::as_str)?;
    let local = record.kind.as_deref() == Some("piaware-local")
        || record.port == Some(DevicePort::Text("file".to_string()))
        || path.starts_with('/');
    local.then(|| PathBuf::from(path))
}

/// Feed URL for a configured network receiver
pub fn receiver_url(record: &DeviceRecord) -> Option<String> {
    if receiver_file(record).is_some() {
        return None;
    }
    if let Some(url) = record.url.as_deref().filter(|u| !u.is_empty()) {
        return Some(feed_url(url));
    }
    if let Some(path) = record.extra.get("path").and_then(Value::as_str) {
        return Some(path.to_string());
    }
    let ip = record.ip.as_deref()?;
    Some(format!(
        "http://{}:{}{}",
        ip,
        record
            .port
            .as_ref()
            .and_then(DevicePort::number)
            .unwrap_or(DEFAULT_RECEIVER_PORT),
        FEED_SUFFIX
    ))
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Empty feed document, optionally carrying an error
pub fn empty_feed(error: Option<&str>) -> Value {
    let mut feed = json!({ "aircraft": [], "messages": 0, "now": now_secs() });
    if let Some(error) = error {
        feed["error"] = Value::from(error);
    }
    feed
}

/// Reads aircraft from the local receiver file or remote receivers
pub struct FlightFeed {
    client: Client,
    local_path: PathBuf,
}

impl FlightFeed {
    pub fn new(local_path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Client::builder().build()?,
            local_path: local_path.into(),
        })
    }

    async fn read_local(&self) -> Option<Value> {
        Self::read_file(&self.local_path).await
    }

    async fn read_file(path: &Path) -> Option<Value> {
        let contents = fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&contents) {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!("Local aircraft feed is malformed: {}", e);
                None
            }
        }
    }

    /// Fetch a remote feed document
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<Value, GatewayError> {
        debug!("GET {}", url);
        let response = self.client.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::UpstreamError(format!("HTTP {}", response.status().as_u16())));
        }
        Ok(response.json().await?)
    }

    /// Aircraft according to `config.flightTracking`
    pub async fn aircraft(&self, config: &Config) -> Value {
        let tracking = &config.flight_tracking;
        if !tracking.enabled {
            let mut feed = empty_feed(None);
            feed["disabled"] = Value::Bool(true);
            return feed;
        }

        match tracking.source() {
            FlightSource::Local => self
                .read_local()
                .await
                .unwrap_or_else(|| empty_feed(Some("Local PiAware not found"))),
            FlightSource::Remote => {
                let Some(url) = tracking.url.as_deref().filter(|u| !u.is_empty()) else {
                    return empty_feed(Some("Remote PiAware URL not configured"));
                };
                match self.fetch(&feed_url(url), FETCH_TIMEOUT).await {
                    Ok(feed) => feed,
                    Err(e) => {
                        warn!("Remote aircraft feed failed: {}", e);
                        empty_feed(Some("Remote PiAware connection failed"))
                    }
                }
            }
            FlightSource::Auto => {
                if let Some(feed) = self.read_local().await {
                    return feed;
                }
                for receiver in &config.piaware {
                    if let Some(path) = receiver_file(receiver) {
                        match Self::read_file(&path).await {
                            Some(feed) => return feed,
                            None => continue,
                        }
                    }
                    let Some(url) = receiver_url(receiver) else {
                        continue;
                    };
                    match self.fetch(&url, FETCH_TIMEOUT).await {
                        Ok(feed) => return feed,
                        Err(e) => debug!("Receiver {} unavailable: {}", url, e),
                    }
                }
                empty_feed(None)
            }
        }
    }

    /// Number of aircraft a feed URL currently reports
    pub async fn test_feed(&self, url: &str) -> Result<usize, GatewayError> {
        let feed = self.fetch(url, FETCH_TIMEOUT).await?;
        feed.get("aircraft")
            .and_then(Value::as_array)
            .map(Vec::len)
            .ok_or_else(|| GatewayError::UpstreamError("Invalid response format".to_string()))
    }

    /// Look for a receiver on `host`
    pub async fn probe(&self, host: &str) -> Option<DeviceRecord> {
        for port in PROBE_PORTS {
            let url = format!("http://{}:{}{}", host, port, FEED_SUFFIX);
            let Ok(feed) = self.fetch(&url, PROBE_TIMEOUT).await else {
                continue;
            };
            if feed.get("aircraft").is_some() {
                return Some(DeviceRecord {
                    id: Some(DeviceId::Text(format!("piaware-{}", host))),
                    ip: Some(host.to_string()),
                    name: Some(format!("PiAware ({})", host)),
                    port: Some(DevicePort::Number(port)),
                    url: Some(format!("http://{}:{}", host, port)),
                    kind: Some("piaware".to_string()),
                    ..Default::default()
                });
            }
        }
        None
    }
}
