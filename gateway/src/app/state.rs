//! Application state management

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_api::models::{CameraSnapshot, Thermostat};
use secrecy::SecretString;
use tracing::info;

use crate::app::options::AppOptions;
use crate::discovery::Discovery;
use crate::errors::GatewayError;
use crate::inventory::merge;
use crate::models::config::GatewaySettings;
use crate::models::device::{DeviceRecord, DeviceType};
use crate::providers::{CameraCloud, ThermostatPortal};
use crate::session::adapter::{AggregateResult, ScrapedSessionAdapter};
use crate::session::transport::{ReqwestTransport, Transport};
use crate::storage::config::ConfigStore;
use crate::storage::credentials::{CredentialStore, CredentialsPatch, EnvCredentials, PortalCredentials};
use crate::vendors::flights::FlightFeed;
use crate::vendors::shelly::RelayClient;
use crate::vendors::weather::WeatherClient;

/// Pluggable collaborators. Production code uses [`Components::production`];
/// tests swap in scripted transports and local URLs.
pub struct Components {
    pub portal: ThermostatPortal,
    pub portal_transport: Arc<dyn Transport>,
    pub camera: CameraCloud,
    pub camera_transport: Arc<dyn Transport>,
    pub weather: WeatherClient,
    pub env: EnvCredentials,
}

impl Components {
    pub fn production(options: &AppOptions) -> Result<Self, GatewayError> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(options.adapters.request_timeout)?);
        Ok(Self {
            portal: ThermostatPortal::new()?,
            portal_transport: Arc::clone(&transport),
            camera: CameraCloud::new()?,
            camera_transport: transport,
            weather: WeatherClient::new()?,
            env: EnvCredentials::from_env(),
        })
    }
}

/// Credentials supplied directly with a discovery request
#[derive(Default)]
pub struct DiscoveryCredentials {
    pub honeywell: Option<PortalCredentials>,
    pub ring_token: Option<SecretString>,
}

/// Main application state
pub struct AppState {
    /// Gateway version
    pub version: String,

    /// Device inventory
    pub config: Arc<ConfigStore>,

    /// Provider secrets
    pub credentials: Arc<CredentialStore>,

    /// Thermostat portal adapter
    pub thermostats: Arc<ScrapedSessionAdapter<ThermostatPortal>>,

    /// Camera cloud adapter
    pub cameras: Arc<ScrapedSessionAdapter<CameraCloud>>,

    /// Local relays
    pub relays: RelayClient,

    /// Flight feed
    pub flights: Arc<FlightFeed>,

    /// Weather
    pub weather: Arc<WeatherClient>,

    /// Subnet discovery
    pub discovery: Arc<Discovery>,

    started_at: Instant,
}

impl AppState {
    /// Initialize application state
    pub async fn init(version: String, options: &AppOptions) -> Result<Self, GatewayError> {
        let components = Components::production(options)?;
        Self::assemble(version, options, components).await
    }

    /// Build the state from explicit collaborators
    pub async fn assemble(
        version: String,
        options: &AppOptions,
        components: Components,
    ) -> Result<Self, GatewayError> {
        info!("Initializing application state...");
        let layout = &options.storage.layout;

        let config = Arc::new(ConfigStore::open(layout.config_file()).await);
        let credentials =
            Arc::new(CredentialStore::open(layout.credentials_file(), components.env).await);

        let thermostats = Arc::new(ScrapedSessionAdapter::new(
            components.portal,
            components.portal_transport,
            options.adapters.thermostat,
        ));
        let cameras = Arc::new(ScrapedSessionAdapter::new(
            components.camera,
            components.camera_transport,
            options.adapters.camera,
        ));

        let relays = RelayClient::new()?;
        let flights = Arc::new(FlightFeed::new(options.flights.local_feed_path.clone())?);
        let discovery = Arc::new(Discovery::new(
            options.discovery.subnet.clone(),
            relays.clone(),
            Arc::clone(&flights),
        ));

        Ok(Self {
            version,
            config,
            credentials,
            thermostats,
            cameras,
            relays,
            flights,
            weather: Arc::new(components.weather),
            discovery,
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Patch credentials; both cloud adapters are invalidated before the
    /// credential lock is released
    pub async fn update_credentials(&self, patch: CredentialsPatch) -> Result<(), GatewayError> {
        let thermostats = Arc::clone(&self.thermostats);
        let cameras = Arc::clone(&self.cameras);
        self.credentials
            .update(patch, move |_| {
                thermostats.invalidate();
                cameras.invalidate();
            })
            .await
    }

    /// Current thermostat readings
    pub async fn thermostat_readings(&self) -> AggregateResult<Thermostat> {
        let ticket = self.thermostats.begin();
        let devices = self.config.snapshot().await.honeywell;
        let credentials = self.credentials.honeywell().await;
        self.thermostats
            .fetch_all_in(ticket, &devices, credentials.as_ref())
            .await
    }

    /// Current camera snapshots. The freshness window follows
    /// `settings.ringSnapshotInterval`.
    pub async fn camera_snapshots(&self) -> AggregateResult<CameraSnapshot> {
        let config = self.config.snapshot().await;
        let interval = GatewaySettings::clamp_snapshot_interval(config.settings.ring_snapshot_interval);
        self.cameras.set_freshness_window(Duration::from_secs(interval));

        let ticket = self.cameras.begin();
        let token = self.credentials.ring_token().await;
        self.cameras
            .fetch_all_in(ticket, &config.ring, token.as_ref())
            .await
    }

    /// Devices of `device_type` found with the stored credentials
    pub async fn discover(&self, device_type: DeviceType) -> Result<Vec<DeviceRecord>, GatewayError> {
        let credentials = DiscoveryCredentials {
            honeywell: self.credentials.honeywell().await,
            ring_token: self.credentials.ring_token().await,
        };
        self.discover_with(device_type, &credentials).await
    }

    /// Devices of `device_type` found with explicit credentials
    pub async fn discover_with(
        &self,
        device_type: DeviceType,
        credentials: &DiscoveryCredentials,
    ) -> Result<Vec<DeviceRecord>, GatewayError> {
        info!("Discovering {} devices...", device_type);
        let devices = match device_type {
            DeviceType::Shelly => self.discovery.relays().await,
            DeviceType::Piaware => self.discovery.receivers().await,
            DeviceType::Honeywell => {
                let creds = credentials.honeywell.as_ref().ok_or_else(|| {
                    GatewayError::ConfigError("Honeywell credentials not configured".to_string())
                })?;
                let session = self.thermostats.login_session(creds).await?;
                self.thermostats.provider().list_devices(&session).await?
            }
            DeviceType::Ring => {
                let token = credentials.ring_token.as_ref().ok_or_else(|| {
                    GatewayError::ConfigError("Ring not configured".to_string())
                })?;
                let session = self.cameras.login_session(token).await?;
                self.cameras.provider().list_devices(&session).await?
            }
        };
        info!("Discovered {} {} device(s)", devices.len(), device_type);
        Ok(devices)
    }

    /// Discover every type; a type that fails contributes an empty list
    pub async fn discover_all(
        &self,
        credentials: &DiscoveryCredentials,
    ) -> BTreeMap<DeviceType, Vec<DeviceRecord>> {
        let mut found = BTreeMap::new();
        for device_type in DeviceType::ALL {
            let devices = match self.discover_with(device_type, credentials).await {
                Ok(devices) => devices,
                Err(e) => {
                    info!("Skipping {} discovery: {}", device_type, e);
                    Vec::new()
                }
            };
            found.insert(device_type, devices);
        }
        found
    }

    /// Merge discovered devices into the inventory
    pub async fn save_discovered(
        &self,
        device_type: DeviceType,
        devices: &[DeviceRecord],
    ) -> Result<usize, GatewayError> {
        if devices.is_empty() {
            return Ok(0);
        }
        self.config
            .update(|config| {
                let merged = merge(config.devices(device_type), devices);
                *config.devices_mut(device_type) = merged;
                Ok(devices.len())
            })
            .await
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        info!("Shutting down application state...");
        Ok(())
    }
}
