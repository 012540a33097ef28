//! Provider credentials
//!
//! Credentials live in their own owner-only file, separate from the device
//! inventory. In memory every secret is a [`SecretString`]; the plain
//! document type only exists between the disk and the store.

use gateway_api::models::{CredentialStatusResponse, HoneywellCredentialStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::errors::GatewayError;
use crate::filesys::file::File;

/// On-disk shape of the credentials file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    honeywell_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    honeywell_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ring_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    shelly_auth: Option<String>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Partial credential update. `Some("")` clears a field, `None` keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPatch {
    #[serde(default)]
    pub honeywell_email: Option<String>,

    #[serde(default)]
    pub honeywell_password: Option<String>,

    #[serde(default)]
    pub ring_token: Option<String>,

    #[serde(default)]
    pub shelly_auth: Option<String>,
}

impl CredentialsPatch {
    pub fn is_empty(&self) -> bool {
        self.honeywell_email.is_none()
            && self.honeywell_password.is_none()
            && self.ring_token.is_none()
            && self.shelly_auth.is_none()
    }

    pub fn touches_honeywell(&self) -> bool {
        self.honeywell_email.is_some() || self.honeywell_password.is_some()
    }

    pub fn touches_ring(&self) -> bool {
        self.ring_token.is_some()
    }
}

/// Values read from the process environment, used when the file has none
#[derive(Debug, Default)]
pub struct EnvCredentials {
    pub honeywell_email: Option<String>,
    pub honeywell_password: Option<String>,
    pub ring_token: Option<String>,
    pub shelly_auth: Option<String>,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            honeywell_email: var("TCC_USERNAME"),
            honeywell_password: var("TCC_PASSWORD"),
            ring_token: var("RING_REFRESH_TOKEN"),
            shelly_auth: var("SHELLY_AUTH_KEY"),
        }
    }
}

/// Username/password pair for a portal login
pub struct PortalCredentials {
    pub username: String,
    pub password: SecretString,
}

#[derive(Default)]
struct Credentials {
    honeywell_email: Option<String>,
    honeywell_password: Option<SecretString>,
    ring_token: Option<SecretString>,
    shelly_auth: Option<SecretString>,
    extra: Map<String, Value>,
}

impl Credentials {
    fn from_document(doc: CredentialsDocument) -> Self {
        Self {
            honeywell_email: non_empty(doc.honeywell_email),
            honeywell_password: non_empty(doc.honeywell_password).map(SecretString::from),
            ring_token: non_empty(doc.ring_token).map(SecretString::from),
            shelly_auth: non_empty(doc.shelly_auth).map(SecretString::from),
            extra: doc.extra,
        }
    }

    fn to_document(&self) -> CredentialsDocument {
        let expose = |s: &Option<SecretString>| s.as_ref().map(|s| s.expose_secret().to_string());
        CredentialsDocument {
            honeywell_email: self.honeywell_email.clone(),
            honeywell_password: expose(&self.honeywell_password),
            ring_token: expose(&self.ring_token),
            shelly_auth: expose(&self.shelly_auth),
            extra: self.extra.clone(),
        }
    }

    fn apply(&mut self, patch: CredentialsPatch) {
        if let Some(email) = patch.honeywell_email {
            self.honeywell_email = non_empty(Some(email));
        }
        if let Some(password) = patch.honeywell_password {
            self.honeywell_password = non_empty(Some(password)).map(SecretString::from);
        }
        if let Some(token) = patch.ring_token {
            self.ring_token = non_empty(Some(token)).map(SecretString::from);
        }
        if let Some(auth) = patch.shelly_auth {
            self.shelly_auth = non_empty(Some(auth)).map(SecretString::from);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// Durable provider secrets with environment fallbacks
pub struct CredentialStore {
    file: File,
    env: EnvCredentials,
    current: RwLock<Credentials>,
}

impl CredentialStore {
    pub async fn open(file: File, env: EnvCredentials) -> Self {
        let credentials = load_credentials(&file).await;
        Self {
            file,
            env,
            current: RwLock::new(credentials),
        }
    }

    /// Thermostat portal login, if both halves are known
    pub async fn honeywell(&self) -> Option<PortalCredentials> {
        let current = self.current.read().await;
        let username = current
            .honeywell_email
            .clone()
            .or_else(|| self.env.honeywell_email.clone())?;
        let password = match &current.honeywell_password {
            Some(password) => copy_secret(password),
            None => SecretString::from(self.env.honeywell_password.clone()?),
        };
        Some(PortalCredentials { username, password })
    }

    /// Camera cloud refresh token
    pub async fn ring_token(&self) -> Option<SecretString> {
        let current = self.current.read().await;
        match &current.ring_token {
            Some(token) => Some(copy_secret(token)),
            None => self.env.ring_token.clone().map(SecretString::from),
        }
    }

    /// Relay cloud auth key
    pub async fn shelly_auth(&self) -> Option<SecretString> {
        let current = self.current.read().await;
        match &current.shelly_auth {
            Some(auth) => Some(copy_secret(auth)),
            None => self.env.shelly_auth.clone().map(SecretString::from),
        }
    }

    /// Which providers are configured. Never includes secret material.
    pub async fn status(&self) -> CredentialStatusResponse {
        let current = self.current.read().await;
        let email = current
            .honeywell_email
            .clone()
            .or_else(|| self.env.honeywell_email.clone());
        let has_password =
            current.honeywell_password.is_some() || self.env.honeywell_password.is_some();

        CredentialStatusResponse {
            honeywell: HoneywellCredentialStatus {
                configured: email.is_some() && has_password,
                email: email.unwrap_or_default(),
            },
            ring: current.ring_token.is_some() || self.env.ring_token.is_some(),
            shelly: current.shelly_auth.is_some() || self.env.shelly_auth.is_some(),
        }
    }

    /// Apply `patch` and persist it.
    ///
    /// `after_write` runs while the write lock is still held, so no reader
    /// can observe the new credentials before dependents are invalidated.
    pub async fn update<F>(&self, patch: CredentialsPatch, after_write: F) -> Result<(), GatewayError>
    where
        F: FnOnce(&CredentialsPatch),
    {
        let mut current = self.current.write().await;
        let touched = patch.clone();
        current.apply(patch);

        let persisted = self.file.write_json_private(&current.to_document()).await;
        after_write(&touched);

        match persisted {
            Ok(()) => {
                info!("Credentials saved to {}", self.file.path().display());
                Ok(())
            }
            Err(e) => {
                error!("Failed to save credentials: {}", e);
                Err(GatewayError::StorageError(e.to_string()))
            }
        }
    }
}

async fn load_credentials(file: &File) -> Credentials {
    if !file.exists().await {
        return Credentials::default();
    }
    match file.read_json::<CredentialsDocument>().await {
        Ok(doc) => {
            info!("Loaded credentials from {}", file.path().display());
            Credentials::from_document(doc)
        }
        Err(e) => {
            warn!("Error reading credentials: {}", e);
            Credentials::default()
        }
    }
}
