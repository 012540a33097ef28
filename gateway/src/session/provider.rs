//! Per-portal behaviour plugged into the generic adapter

use async_trait::async_trait;
use url::Url;

use crate::errors::GatewayError;
use crate::models::device::DeviceRecord;
use crate::session::client::Session;

/// What a cloud portal needs to do inside one session cycle
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    type Credentials: Send + Sync;
    type Reading: Clone + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Base URL relative paths are resolved against
    fn base_url(&self) -> &Url;

    /// Establish an authenticated session (cookies, bearer token, ...)
    async fn login(&self, session: &Session, credentials: &Self::Credentials) -> Result<(), GatewayError>;

    /// Fetch and extract one device's reading
    async fn fetch(&self, session: &Session, device: &DeviceRecord) -> Result<Self::Reading, GatewayError>;

    /// Reading reported for a device whose fetch failed
    fn placeholder(&self, device: &DeviceRecord, error: &GatewayError) -> Self::Reading;

    /// Whether a reading carries real data; only valid readings refresh the cache
    fn is_valid(&self, reading: &Self::Reading) -> bool;
}
