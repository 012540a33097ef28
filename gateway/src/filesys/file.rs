//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::GatewayError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, GatewayError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Serialize `value` as pretty JSON and atomically replace the file
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), GatewayError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_atomic(contents.as_bytes()).await
    }

    /// Like [`File::write_json`], but the result is readable by the owner only
    pub async fn write_json_private<T: Serialize>(&self, value: &T) -> Result<(), GatewayError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_atomic_with_mode(contents.as_bytes(), Some(0o600))
            .await
    }

    /// Copy the file to `<path>.bak`, replacing an older backup
    pub async fn backup(&self) -> Result<File, GatewayError> {
        let mut path = self.path.clone().into_os_string();
        path.push(".bak");
        let backup = File::new(PathBuf::from(path));
        fs::copy(&self.path, backup.path()).await?;
        Ok(backup)
    }

    /// Atomic write using a temporary file
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), GatewayError> {
        self.write_atomic_with_mode(contents, None).await
    }

    async fn write_atomic_with_mode(
        &self,
        contents: &[u8],
        mode: Option<u32>,
    ) -> Result<(), GatewayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        // Restrict before any secret bytes land on disk
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).await?;
            }
        }
        #[cfg(not(unix))]
        let _ = mode;

        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
