use crate::config::{resolve_sas_url, sas_url_from_env, StoreConfig};
use crate::error::{CatscrapeError, StoreError};
use crate::services::azure::AzureBlobStore;
use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Object storage seen as `container/blob_name -> bytes`. Writes overwrite.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn write(
        &self,
        container: &str,
        blob_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError>;
}

/// Platform data directory used when no explicit root is configured.
pub fn data_dir() -> crate::Result<PathBuf> {
    let proj = ProjectDirs::from("io", "catscrape", "catscrape")
        .ok_or_else(|| CatscrapeError::config("could not resolve data dir"))?;
    Ok(proj.data_local_dir().to_path_buf())
}

/// Blobs as plain files: `<root>/<container>/<blob_name>`.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store under the platform data dir (`.../catscrape/blobs`).
    pub fn in_data_dir() -> crate::Result<Self> {
        Self::new(data_dir()?.join("blobs"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, container: &str, blob_name: &str) -> Result<PathBuf, StoreError> {
        for part in [container, blob_name] {
            if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
                return Err(StoreError::InvalidUrl(format!("unsafe blob path: {part}")));
            }
        }
        Ok(self.root.join(container).join(blob_name))
    }
}

#[async_trait]
impl BlobStore for LocalFsStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn write(
        &self,
        container: &str,
        blob_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(container, blob_name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, payload).await?;
        Ok(())
    }
}

/// In-process store; nothing outlives the process.
#[derive(Default, Clone)]
pub struct MemoryStore {
    blobs: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, container: &str, blob_name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .ok()?
            .get(&(container.to_string(), blob_name.to_string()))
            .cloned()
    }

    /// Blob names in `container`, sorted.
    pub fn names(&self, container: &str) -> Vec<String> {
        self.blobs
            .lock()
            .map(|blobs| {
                blobs
                    .keys()
                    .filter(|(c, _)| c == container)
                    .map(|(_, n)| n.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write(
        &self,
        container: &str,
        blob_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Http("memory store poisoned".into()))?;
        blobs.insert((container.to_string(), blob_name.to_string()), payload);
        Ok(())
    }
}

/// Build the configured store.
pub fn build_store(cfg: &StoreConfig) -> crate::Result<Arc<dyn BlobStore>> {
    Ok(match cfg {
        StoreConfig::Local { root: Some(root) } => Arc::new(LocalFsStore::new(root.clone())?),
        StoreConfig::Local { root: None } => Arc::new(LocalFsStore::in_data_dir()?),
        StoreConfig::Azure { sas_url } => {
            let url = resolve_sas_url(sas_url.as_deref(), sas_url_from_env()).ok_or_else(|| {
                CatscrapeError::config(format!(
                    "azure store needs a SAS url (config store.sas_url or {})",
                    crate::config::SAS_URL_ENV
                ))
            })?;
            Arc::new(AzureBlobStore::from_sas_url(&url)?)
        }
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    })
}
