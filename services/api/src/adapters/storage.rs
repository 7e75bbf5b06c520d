//! services/api/src/adapters/storage.rs
//!
//! A file bucket on the local disk, implementing the `StorageService` port.
//! Objects are served back by the router under `/files`.

use async_trait::async_trait;
use levelup_core::ports::{PortError, PortResult, StorageService};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// URL path prefix the router serves stored objects from.
pub const FILES_ROUTE: &str = "/files";

#[derive(Clone)]
pub struct LocalStorageAdapter {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorageAdapter {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_prefix(&self) -> String {
        format!("{}{}/", self.public_base_url, FILES_ROUTE)
    }

    /// Resolves a key inside the bucket, refusing anything that could escape it.
    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PortError::Invalid(format!("invalid storage key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorageAdapter {
    async fn put_object(&self, key: &str, data: &[u8]) -> PortResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!("Stored {} bytes at {}", data.len(), path.display());
        Ok(format!("{}{}", self.url_prefix(), key))
    }

    async fn delete_object(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}
