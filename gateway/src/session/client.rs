//! One login-to-fetch cycle against a portal

use std::sync::{Arc, Mutex};

use http::Method;
use tracing::debug;
use url::Url;

use crate::errors::GatewayError;
use crate::session::cookies::CookieJar;
use crate::session::transport::{Transport, UpstreamRequest, UpstreamResponse};

/// Where a session is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoggingIn,
    FollowingRedirects,
    FetchingResources,
    Done,
    Failed,
}

/// Cookie jar plus optional bearer token, scoped to a single cycle.
///
/// Every response passing through [`Session::send`] updates the jar.
pub struct Session {
    transport: Arc<dyn Transport>,
    base: Url,
    jar: Mutex<CookieJar>,
    bearer: Mutex<Option<String>>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, base: Url) -> Self {
        Self {
            transport,
            base,
            jar: Mutex::new(CookieJar::new()),
            bearer: Mutex::new(None),
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!("Session {:?} -> {:?}", *current, state);
        *current = state;
    }

    /// Snapshot of the cookie jar
    pub fn cookies(&self) -> CookieJar {
        self.jar.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_bearer(&self, token: impl Into<String>) {
        *self.bearer.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn has_bearer(&self) -> bool {
        self.bearer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Resolve `path` against the session base; absolute URLs pass through
    pub fn url(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(path)?)
    }

    pub async fn get(&self, path: &str) -> Result<UpstreamResponse, GatewayError> {
        let url = self.url(path)?;
        self.send(UpstreamRequest::new(Method::GET, url)).await
    }

    pub async fn post_form(&self, path: &str, form: String) -> Result<UpstreamResponse, GatewayError> {
        let url = self.url(path)?;
        let mut request = UpstreamRequest::new(Method::POST, url);
        request.form = Some(form);
        self.send(request).await
    }

    /// Send with the session's cookies and bearer attached, then absorb
    /// any `Set-Cookie` headers from the response
    pub async fn send(&self, mut request: UpstreamRequest) -> Result<UpstreamResponse, GatewayError> {
        if request.cookie.is_none() {
            request.cookie = self.jar.lock().unwrap_or_else(|e| e.into_inner()).header_value();
        }
        if request.bearer.is_none() {
            request.bearer = self.bearer.lock().unwrap_or_else(|e| e.into_inner()).clone();
        }

        let response = self.transport.send(request).await?;

        let mut jar = self.jar.lock().unwrap_or_else(|e| e.into_inner());
        for header in &response.set_cookies {
            jar.apply_set_cookie(header);
        }
        Ok(response)
    }

    /// Follow at most `max_hops` `Location` redirects starting from `response`
    pub async fn follow_redirects(
        &self,
        mut response: UpstreamResponse,
        max_hops: usize,
    ) -> Result<UpstreamResponse, GatewayError> {
        let mut hops = 0;
        while hops < max_hops {
            let Some(location) = response.location.clone().filter(|_| response.is_redirect()) else {
                break;
            };
            self.set_state(SessionState::FollowingRedirects);
            debug!("Following redirect {} of {}", hops + 1, max_hops);
            response = self.get(&location).await?;
            hops += 1;
        }
        Ok(response)
    }
}
