//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::session::adapter::AdapterPolicy;
use crate::storage::layout::StorageLayout;
use crate::vendors::flights::LOCAL_FEED_PATH;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Cloud adapter policies
    pub adapters: AdapterOptions,

    /// Local network discovery
    pub discovery: DiscoveryOptions,

    /// Flight feed configuration
    pub flights: FlightOptions,
}

/// Lifecycle options for the gateway
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

/// Server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Policies for the session adapters
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub thermostat: AdapterPolicy,
    pub camera: AdapterPolicy,

    /// Timeout for a single portal request
    pub request_timeout: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            thermostat: AdapterPolicy::new(Duration::from_secs(30), Duration::from_secs(5)),
            camera: AdapterPolicy::new(Duration::from_secs(15), Duration::from_secs(20)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Discovery options
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Subnet swept for relays and flight receivers
    pub subnet: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            subnet: "192.168.1.0/24".to_string(),
        }
    }
}

/// Flight feed options
#[derive(Debug, Clone)]
pub struct FlightOptions {
    /// Aircraft file written by a receiver running on this host
    pub local_feed_path: PathBuf,
}

impl Default for FlightOptions {
    fn default() -> Self {
        Self {
            local_feed_path: PathBuf::from(LOCAL_FEED_PATH),
        }
    }
}
