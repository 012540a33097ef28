//! Config file management
//!
//! The store keeps the current document in memory and rewrites the whole
//! file on every mutation. Writers are serialized by the in-memory lock;
//! reads never touch the disk.
//!
//! A file that could not be read in full is copied to `<path>.bak` before
//! the first write replaces it.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::errors::GatewayError;
use crate::filesys::file::File;
use crate::models::config::{Config, CONFIG_VERSION};
use crate::storage::migrate::migrate;

/// Durable device inventory
pub struct ConfigStore {
    file: File,
    current: RwLock<Config>,
    needs_backup: AtomicBool,
}

impl ConfigStore {
    /// Open the store, loading (and if needed migrating or seeding) the file
    pub async fn open(file: File) -> Self {
        let loaded = load_config(&file).await;
        Self {
            file,
            current: RwLock::new(loaded.config),
            needs_backup: AtomicBool::new(!loaded.intact),
        }
    }

    /// The backing file
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Re-read the file, replacing the in-memory document
    pub async fn load(&self) -> Config {
        let loaded = load_config(&self.file).await;
        let mut current = self.current.write().await;
        *current = loaded.config.clone();
        if !loaded.intact {
            self.needs_backup.store(true, Ordering::SeqCst);
        }
        loaded.config
    }

    /// A copy of the current document
    pub async fn snapshot(&self) -> Config {
        self.current.read().await.clone()
    }

    /// Replace the whole document
    pub async fn save(&self, config: Config) -> Result<(), GatewayError> {
        self.update(move |current| {
            *current = config;
            Ok(())
        })
        .await
    }

    /// Replace the whole document from untyped JSON (e.g. a request body)
    pub async fn save_value(&self, value: Value) -> Result<(), GatewayError> {
        self.save(parse_config(value)?).await
    }

    /// Apply `mutate` to a copy of the current document and persist it.
    ///
    /// Nothing changes when `mutate` fails. When persisting fails the
    /// in-memory document is still updated and the error is returned.
    pub async fn update<F, T>(&self, mutate: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut Config) -> Result<T, GatewayError>,
    {
        let mut current = self.current.write().await;
        self.preserve_unread_file().await?;
        let mut next = current.clone();
        let output = mutate(&mut next)?;
        next.version = CONFIG_VERSION;

        let persisted = self.file.write_json(&next).await;
        *current = next;

        if let Err(e) = persisted {
            error!(
                "Failed to write config to {}: {}",
                self.file.path().display(),
                e
            );
            return Err(GatewayError::StorageError(e.to_string()));
        }
        Ok(output)
    }

    /// Keep a copy of a file this store could not fully read. Writes are
    /// refused while the copy cannot be made.
    async fn preserve_unread_file(&self) -> Result<(), GatewayError> {
        if !self.needs_backup.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.file.exists().await {
            let backup = self.file.backup().await.map_err(|e| {
                error!("Unable to back up {}: {}", self.file.path().display(), e);
                GatewayError::StorageError(format!(
                    "Refusing to overwrite unreadable config: {}",
                    e
                ))
            })?;
            warn!(
                "Previous config preserved at {}",
                backup.path().display()
            );
        }
        self.needs_backup.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Reset to the empty inventory
    pub async fn reset(&self) -> Result<(), GatewayError> {
        self.save(Config::default()).await
    }

    /// Whether the config file exists on disk
    pub async fn exists(&self) -> bool {
        self.file.exists().await
    }
}

/// Validate an untyped document (e.g. a request body) as a config.
/// Device records read back from [`ConfigStore::snapshot`] always pass.
pub fn parse_config(value: Value) -> Result<Config, GatewayError> {
    let (config, dropped) = Config::from_stored(value)
        .map_err(|e| GatewayError::ValidationError(format!("Invalid config: {}", e)))?;
    if dropped > 0 {
        return Err(GatewayError::ValidationError(format!(
            "Invalid config: {} device entries are not objects",
            dropped
        )));
    }
    Ok(config)
}

/// Outcome of [`load_config`]
pub struct LoadedConfig {
    pub config: Config,
    /// False when the file exists but part or all of it could not be used
    pub intact: bool,
}

impl LoadedConfig {
    fn damaged() -> Self {
        Self {
            config: Config::default(),
            intact: false,
        }
    }
}

/// Load the config file.
///
/// Never fails: a missing file is seeded with the defaults; unreadable or
/// malformed files degrade to the defaults in memory and are left alone.
pub async fn load_config(file: &File) -> LoadedConfig {
    if !file.exists().await {
        info!(
            "No config found, creating default at: {}",
            file.path().display()
        );
        let config = Config::default();
        if let Err(e) = file.write_json(&config).await {
            warn!("Unable to seed config file: {}", e);
        }
        return LoadedConfig {
            config,
            intact: true,
        };
    }

    let contents = match file.read_string().await {
        Ok(contents) => contents,
        Err(e) => {
            error!("Error reading config {}: {}", file.path().display(), e);
            return LoadedConfig::damaged();
        }
    };

    let raw: Value = match serde_json::from_str(&contents) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Malformed config {}: {}", file.path().display(), e);
            return LoadedConfig::damaged();
        }
    };

    let migration = match migrate(raw) {
        Ok(migration) => migration,
        Err(e) => {
            error!("Config migration failed: {}", e);
            return LoadedConfig::damaged();
        }
    };

    let (config, dropped) = match Config::from_stored(migration.value) {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Config does not match the schema: {}", e);
            return LoadedConfig::damaged();
        }
    };
    let intact = dropped == 0;
    if !intact {
        warn!(
            "Skipped {} unusable device entries in {}; it will be backed up before the next write",
            dropped,
            file.path().display()
        );
    }

    if migration.migrated && intact {
        match file.write_json(&config).await {
            Ok(()) => info!(
                "Config migration complete (v{} -> v{})",
                migration.from_version, config.version
            ),
            Err(e) => warn!("Unable to persist migrated config: {}", e),
        }
    }

    info!(
        "Loaded config v{}: {} shelly, {} honeywell, {} ring, {} piaware",
        config.version,
        config.shelly.len(),
        config.honeywell.len(),
        config.ring.len(),
        config.piaware.len()
    );

    LoadedConfig { config, intact }
}
