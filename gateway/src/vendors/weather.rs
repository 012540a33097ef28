//! National Weather Service observation and forecast

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::GatewayError;

pub const OBSERVATION_URL: &str = "https://api.weather.gov/stations/KRDU/observations/latest";
pub const FORECAST_URL: &str = "https://api.weather.gov/gridpoints/RAH/73,57/forecast";
/// How long a weather response is reused
pub const CACHE_TTL: Duration = Duration::from_secs(300);

const USER_AGENT: &str = "NEXUS Dashboard";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Weather client with a single-entry response cache
pub struct WeatherClient {
    client: Client,
    observation_url: String,
    forecast_url: String,
    cache: Mutex<Option<(Instant, Value)>>,
}

impl WeatherClient {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_urls(OBSERVATION_URL, FORECAST_URL)
    }

    pub fn with_urls(observation_url: &str, forecast_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            observation_url: observation_url.to_string(),
            forecast_url: forecast_url.to_string(),
            cache: Mutex::new(None),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::UpstreamError(format!(
                "weather service returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// `{success, observation, forecast}`, from cache when younger than [`CACHE_TTL`]
    pub async fn current(&self) -> Result<Value, GatewayError> {
        let mut cache = self.cache.lock().await;
        if let Some((stored, value)) = cache.as_ref() {
            if stored.elapsed() < CACHE_TTL {
                return Ok(value.clone());
            }
        }

        let observation = self.get_json(&self.observation_url).await?;
        let forecast = self.get_json(&self.forecast_url).await?;

        let value = json!({
            "success": true,
            "observation": observation.get("properties").cloned().unwrap_or(Value::Null),
            "forecast": forecast
                .pointer("/properties/periods")
                .cloned()
                .unwrap_or_else(|| json!([])),
        });
        *cache = Some((Instant::now(), value.clone()));
        Ok(value)
    }
}
