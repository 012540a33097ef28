//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Where the gateway keeps its durable documents
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Device inventory document
    pub config_path: PathBuf,

    /// Credentials document, kept apart so it can be owner-only
    pub credentials_path: PathBuf,
}

impl StorageLayout {
    /// Create a layout with both documents under `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            config_path: base_dir.join("config.json"),
            credentials_path: base_dir.join(".credentials.json"),
        }
    }

    /// Get the config file
    pub fn config_file(&self) -> File {
        File::new(self.config_path.clone())
    }

    /// Get the credentials file
    pub fn credentials_file(&self) -> File {
        File::new(self.credentials_path.clone())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/opt/nexus")
    }
}
