//! Cached, single-flight session cycles
//!
//! State is grouped into generations. [`ScrapedSessionAdapter::invalidate`]
//! swaps in a fresh generation; a cycle already running keeps the one it
//! started with and its result can never land in the new cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::errors::GatewayError;
use crate::models::device::DeviceRecord;
use crate::session::client::{Session, SessionState};
use crate::session::provider::SessionProvider;
use crate::session::transport::Transport;

/// Cache and timeout policy for one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterPolicy {
    /// Cached results younger than this are served without contacting the portal
    pub freshness_window: Duration,
    /// Upper bound on a single device fetch
    pub device_timeout: Duration,
    /// Serve the previous result, tagged stale, when a cycle cannot produce one
    pub serve_stale: bool,
}

impl AdapterPolicy {
    pub fn new(freshness_window: Duration, device_timeout: Duration) -> Self {
        Self {
            freshness_window,
            device_timeout,
            serve_stale: true,
        }
    }
}

/// How current an aggregate is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Produced by the cycle that answered this call
    Live,
    /// Served from cache within the freshness window
    Cached,
    /// Served from cache because the cycle failed
    Stale,
}

/// Outcome of [`ScrapedSessionAdapter::fetch_all`]
#[derive(Debug, Clone)]
pub enum AggregateResult<R> {
    Ready {
        items: Vec<R>,
        freshness: Freshness,
        fetched_at: DateTime<Utc>,
    },
    /// No devices or no credentials, and nothing cached
    NotConfigured,
    /// The session failed and nothing cached
    Failed(String),
}

struct CachedResult<R> {
    payload: Vec<R>,
    fetched_at: DateTime<Utc>,
    stored: Instant,
}

struct Generation<R> {
    id: u64,
    cache: RwLock<Option<CachedResult<R>>>,
    cycle: Mutex<()>,
}

impl<R: Clone> Generation<R> {
    fn new(id: u64) -> Self {
        Self {
            id,
            cache: RwLock::new(None),
            cycle: Mutex::new(()),
        }
    }

    fn cached(&self, max_age: Option<Duration>) -> Option<(Vec<R>, DateTime<Utc>)> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        let entry = cache.as_ref()?;
        if let Some(max_age) = max_age {
            if entry.stored.elapsed() >= max_age {
                return None;
            }
        }
        Some((entry.payload.clone(), entry.fetched_at))
    }

    fn store(&self, payload: Vec<R>, fetched_at: DateTime<Utc>) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = Some(CachedResult {
            payload,
            fetched_at,
            stored: Instant::now(),
        });
    }
}

/// The generation a request started in. Take it before reading the
/// credentials the request will use, so that a credential write landing in
/// between can only touch the old generation's cache.
pub struct CycleTicket<R> {
    generation: Arc<Generation<R>>,
}

impl<R> CycleTicket<R> {
    pub fn generation_id(&self) -> u64 {
        self.generation.id
    }
}

/// Generic stateful adapter over a [`SessionProvider`]
pub struct ScrapedSessionAdapter<P: SessionProvider> {
    provider: Arc<P>,
    transport: Arc<dyn Transport>,
    policy: RwLock<AdapterPolicy>,
    generation: RwLock<Arc<Generation<P::Reading>>>,
    next_generation: AtomicU64,
}

impl<P: SessionProvider> ScrapedSessionAdapter<P> {
    pub fn new(provider: P, transport: Arc<dyn Transport>, policy: AdapterPolicy) -> Self {
        Self {
            provider: Arc::new(provider),
            transport,
            policy: RwLock::new(policy),
            generation: RwLock::new(Arc::new(Generation::new(0))),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn policy(&self) -> AdapterPolicy {
        *self.policy.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_policy(&self, policy: AdapterPolicy) {
        *self.policy.write().unwrap_or_else(|e| e.into_inner()) = policy;
    }

    pub fn set_freshness_window(&self, window: Duration) {
        let mut policy = self.policy.write().unwrap_or_else(|e| e.into_inner());
        policy.freshness_window = window;
    }

    /// Identifier of the current generation; changes on every invalidation
    pub fn generation_id(&self) -> u64 {
        self.current_generation().id
    }

    fn current_generation(&self) -> Arc<Generation<P::Reading>> {
        Arc::clone(&self.generation.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Pin the current generation for one request
    pub fn begin(&self) -> CycleTicket<P::Reading> {
        CycleTicket {
            generation: self.current_generation(),
        }
    }

    /// Drop the session and cache. Takes effect before this call returns.
    pub fn invalidate(&self) {
        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut generation = self.generation.write().unwrap_or_else(|e| e.into_inner());
        *generation = Arc::new(Generation::new(id));
        info!("{} adapter invalidated (generation {})", self.provider.name(), id);
    }

    /// Open a standalone session, e.g. for discovery
    pub async fn login_session(&self, credentials: &P::Credentials) -> Result<Session, GatewayError> {
        let session = Session::new(self.transport(), self.provider.base_url().clone());
        session.set_state(SessionState::LoggingIn);
        match self.provider.login(&session, credentials).await {
            Ok(()) => {
                session.set_state(SessionState::Done);
                Ok(session)
            }
            Err(e) => {
                session.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    fn stale_or(
        &self,
        generation: &Generation<P::Reading>,
        policy: &AdapterPolicy,
        fallback: AggregateResult<P::Reading>,
    ) -> AggregateResult<P::Reading> {
        if policy.serve_stale {
            if let Some((items, fetched_at)) = generation.cached(None) {
                return AggregateResult::Ready {
                    items,
                    freshness: Freshness::Stale,
                    fetched_at,
                };
            }
        }
        fallback
    }

    /// Read every device, from cache when fresh enough
    pub async fn fetch_all(
        &self,
        devices: &[DeviceRecord],
        credentials: Option<&P::Credentials>,
    ) -> AggregateResult<P::Reading> {
        self.fetch_all_in(self.begin(), devices, credentials).await
    }

    /// Like [`Self::fetch_all`], inside the generation pinned by `ticket`.
    /// Results only ever land in that generation's cache.
    pub async fn fetch_all_in(
        &self,
        ticket: CycleTicket<P::Reading>,
        devices: &[DeviceRecord],
        credentials: Option<&P::Credentials>,
    ) -> AggregateResult<P::Reading> {
        let generation = ticket.generation;
        let policy = self.policy();

        let credentials = match credentials {
            Some(credentials) if !devices.is_empty() => credentials,
            _ => {
                debug!("{}: no devices or credentials", self.provider.name());
                return self.stale_or(&generation, &policy, AggregateResult::NotConfigured);
            }
        };

        let _cycle = generation.cycle.lock().await;

        if let Some((items, fetched_at)) = generation.cached(Some(policy.freshness_window)) {
            return AggregateResult::Ready {
                items,
                freshness: Freshness::Cached,
                fetched_at,
            };
        }

        let session = Session::new(self.transport(), self.provider.base_url().clone());
        session.set_state(SessionState::LoggingIn);
        if let Err(e) = self.provider.login(&session, credentials).await {
            session.set_state(SessionState::Failed);
            warn!("{} login failed: {}", self.provider.name(), e);
            return self.stale_or(&generation, &policy, AggregateResult::Failed(e.to_string()));
        }

        session.set_state(SessionState::FetchingResources);
        let fetches = devices.iter().map(|device| {
            let session = &session;
            let provider = &self.provider;
            async move {
                match timeout(policy.device_timeout, provider.fetch(session, device)).await {
                    Ok(Ok(reading)) => reading,
                    Ok(Err(e)) => {
                        warn!("{} fetch failed for {:?}: {}", provider.name(), device.identity_key(), e);
                        provider.placeholder(device, &e)
                    }
                    Err(_) => {
                        let e = GatewayError::Timeout(format!(
                            "device fetch exceeded {:?}",
                            policy.device_timeout
                        ));
                        warn!("{} fetch timed out for {:?}", provider.name(), device.identity_key());
                        provider.placeholder(device, &e)
                    }
                }
            }
        });
        let items = join_all(fetches).await;
        session.set_state(SessionState::Done);

        let fetched_at = Utc::now();
        if items.iter().any(|reading| self.provider.is_valid(reading)) {
            generation.store(items.clone(), fetched_at);
            return AggregateResult::Ready {
                items,
                freshness: Freshness::Live,
                fetched_at,
            };
        }

        warn!("{}: every device fetch failed", self.provider.name());
        self.stale_or(
            &generation,
            &policy,
            AggregateResult::Ready {
                items,
                freshness: Freshness::Live,
                fetched_at,
            },
        )
    }
}
