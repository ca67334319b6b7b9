use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const TRANSCRIPTS_NAMESPACE: &str = "transcripts";
pub const SUMMARIES_NAMESPACE: &str = "summaries";

pub const TRANSCRIPT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const SUMMARY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Persisted envelope: `{ "expiresAt": epoch-ms, "value": ... }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry<T> {
    expires_at: u64,
    value: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntryRef<'a, T> {
    expires_at: u64,
    value: &'a T,
}

pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("reviser")
}

/// Durable expiring key/value store for one namespace of JSON blobs at
/// `<root>/<namespace>/<key>.json`. No in-process mutable state; safe to
/// share across processes. Expiry is lazy: an expired entry is deleted on
/// the read that finds it. A `disabled` cache reads nothing and writes
/// nothing — caching is a performance optimization, never a correctness
/// dependency.
pub struct BlobCache<T> {
    root: Option<PathBuf>,
    namespace: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> BlobCache<T> {
    pub fn new(root: impl Into<PathBuf>, namespace: &str) -> Self {
        BlobCache {
            root: Some(root.into()),
            namespace: namespace.to_string(),
            _marker: PhantomData,
        }
    }

    /// No-op variant: `get` always misses, `set` does nothing
    pub fn disabled(namespace: &str) -> Self {
        BlobCache {
            root: None,
            namespace: namespace.to_string(),
            _marker: PhantomData,
        }
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(&self.namespace).join(format!("{key}.json")))
    }

    /// Look up a stored value. Missing, corrupted, schema-mismatched, and
    /// expired entries are all misses; corruption never reaches the caller.
    pub async fn get(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache read failed at {}: {e}", path.display());
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&data) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Invalid cache entry at {}: {e}", path.display());
                return None;
            }
        };

        if entry.expires_at < now_epoch_ms() {
            debug!("Cache entry expired, deleting: {}", path.display());
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        debug!("Cache hit: {}", path.display());
        Some(entry.value)
    }

    /// Write a value with the given time-to-live, overwriting any prior entry
    pub async fn set(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let Some(path) = self.entry_path(key) else {
            return Ok(());
        };

        let entry = CacheEntryRef {
            expires_at: now_epoch_ms() + ttl.as_millis() as u64,
            value,
        };

        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        tokio::fs::write(&path, serde_json::to_vec(&entry)?).await?;
        debug!("Cached entry: {}", path.display());
        Ok(())
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
