//! Local file-backed cache, the on-disk analogue of browser local storage.
//!
//! The whole store is a single JSON document mapping keys to
//! `{ "value": ..., "expiresAt": <epoch millis> }`. It is read once when
//! the provider opens and rewritten (temp file + rename) on every change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use bazaar_core::config::cache::FileCacheConfig;
use bazaar_core::error::{AppError, ErrorKind};
use bazaar_core::result::AppResult;
use bazaar_core::traits::cache::CacheProvider;

/// One persisted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    value: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// File-backed cache provider.
#[derive(Debug, Clone)]
pub struct FileCacheProvider {
    /// Location of the JSON document.
    path: PathBuf,
    /// In-memory mirror of the document.
    entries: Arc<Mutex<HashMap<String, StoredEntry>>>,
}

impl FileCacheProvider {
    /// Open the store, loading any existing document.
    ///
    /// A missing file starts an empty store. A corrupt file is discarded
    /// with a warning rather than failing startup.
    pub async fn open(config: &FileCacheConfig) -> AppResult<Self> {
        let path = PathBuf::from(&config.path);
        let entries = load_document(&path).await?;
        debug!(path = %path.display(), entries = entries.len(), "Opened local file store");

        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, StoredEntry>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to write {}", tmp.display()),
                e,
            )
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to replace {}", self.path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

async fn load_document(path: &Path) -> AppResult<HashMap<String, StoredEntry>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<HashMap<String, StoredEntry>>(&bytes) {
        Ok(entries) => {
            let now = Utc::now();
            Ok(entries
                .into_iter()
                .filter(|(_, entry)| entry.is_live(now))
                .collect())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Discarding unreadable local store");
            Ok(HashMap::new())
        }
    }
}

#[async_trait]
impl CacheProvider for FileCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::with_source(ErrorKind::Cache, "TTL out of range", e))?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
        self.persist(&entries).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let entries = self.entries.lock().await;
        self.persist(&entries).await?;
        Ok(true)
    }
}
