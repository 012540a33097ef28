//! Local network discovery of relays and flight receivers.
//!
//! A sweep TCP-probes every host in the configured subnet and only asks
//! the vendor API of hosts that accepted a connection. Concurrency is
//! bounded by a semaphore.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv4Net;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::errors::GatewayError;
use crate::models::device::DeviceRecord;
use crate::vendors::flights::{FlightFeed, PROBE_PORTS as RECEIVER_PORTS};
use crate::vendors::shelly::RelayClient;

/// Max concurrent probes to avoid overwhelming the local network.
const MAX_CONCURRENT: usize = 64;

/// Per-connection timeout.
const PROBE_TIMEOUT_MS: u64 = 500;

/// Largest number of hosts a single sweep visits.
const MAX_SWEEP_HOSTS: usize = 1024;

/// Relays answer HTTP on port 80.
const RELAY_PORT: u16 = 80;

/// Hosts in `cidr`, e.g. `"192.168.1.0/24"`
pub fn hosts(cidr: &str) -> Result<Vec<IpAddr>, GatewayError> {
    let net: Ipv4Net = cidr
        .parse()
        .map_err(|e| GatewayError::ConfigError(format!("Invalid CIDR {}: {}", cidr, e)))?;
    let hosts: Vec<IpAddr> = net.hosts().map(IpAddr::V4).take(MAX_SWEEP_HOSTS).collect();
    Ok(hosts)
}

/// Whether `port` on `ip` accepts a TCP connection
async fn port_open(ip: IpAddr, port: u16) -> bool {
    let timeout = Duration::from_millis(PROBE_TIMEOUT_MS);
    let addr = SocketAddr::new(ip, port);
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Run `probe` against every host in `cidr`, bounded by [`MAX_CONCURRENT`]
pub async fn sweep<F, Fut>(cidr: &str, probe: F) -> Vec<DeviceRecord>
where
    F: Fn(IpAddr) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Option<DeviceRecord>> + Send + 'static,
{
    let hosts = match hosts(cidr) {
        Ok(hosts) => hosts,
        Err(e) => {
            warn!("{}", e);
            return vec![];
        }
    };
    info!("Scanning {} hosts in {}", hosts.len(), cidr);

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT));
    let mut handles = Vec::with_capacity(hosts.len());

    for ip in hosts {
        let sem = Arc::clone(&semaphore);
        let probe = probe.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.ok()?;
            probe(ip).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        if let Ok(Some(device)) = handle.await {
            debug!("Found device: {:?}", device.identity_key());
            results.push(device);
        }
    }

    info!("Scan complete: {} devices found", results.len());
    results
}

/// Subnet sweeps for the local-network providers
pub struct Discovery {
    subnet: String,
    relays: RelayClient,
    flights: Arc<FlightFeed>,
}

impl Discovery {
    pub fn new(subnet: impl Into<String>, relays: RelayClient, flights: Arc<FlightFeed>) -> Self {
        Self {
            subnet: subnet.into(),
            relays,
            flights,
        }
    }

    pub fn subnet(&self) -> &str {
        &self.subnet
    }

    /// Relays answering the device-info API
    pub async fn relays(&self) -> Vec<DeviceRecord> {
        let relays = self.relays.clone();
        sweep(&self.subnet, move |ip| {
            let relays = relays.clone();
            async move {
                if !port_open(ip, RELAY_PORT).await {
                    return None;
                }
                relays.probe(&ip.to_string()).await
            }
        })
        .await
    }

    /// Flight receivers serving an aircraft feed
    pub async fn receivers(&self) -> Vec<DeviceRecord> {
        let flights = Arc::clone(&self.flights);
        sweep(&self.subnet, move |ip| {
            let flights = Arc::clone(&flights);
            async move {
                let mut reachable = false;
                for port in RECEIVER_PORTS {
                    if port_open(ip, port).await {
                        reachable = true;
                        break;
                    }
                }
                if !reachable {
                    return None;
                }
                flights.probe(&ip.to_string()).await
            }
        })
        .await
    }
}
