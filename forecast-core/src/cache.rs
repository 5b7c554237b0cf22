//! Key/value stores with per-entry expiration used to hold assembled forecasts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::NamedTempFile;
use tokio::task;

pub const CACHE_FILE_NAME: &str = "forecast_cache.json";

#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Returns `None` for missing or expired keys.
    async fn read(&self, key: &str) -> Result<Option<Value>>;

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn new(value: Value, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl).context("TTL overflow")?;
        Ok(Self {
            value,
            expires_at: Utc::now() + ttl,
        })
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// In-process cache; entries vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let now = Utc::now();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(key).filter(|e| e.is_fresh(now)) {
            return Ok(Some(entry.value.clone()));
        }

        if entries.remove(key).is_some() {
            tracing::debug!(key, "Cache entry expired");
        }
        Ok(None)
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = StoredEntry::new(value, ttl)?;
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }
}

/// Cache persisted as a single JSON file so entries survive between CLI runs.
///
/// Writes through one instance (and its clones) are serialized, and the file
/// is replaced by a rename so readers never see a partial document. Writes to
/// the same key still follow last-write-wins.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::default(),
        }
    }

    /// `forecast_cache.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, StoredEntry>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read cache file: {}", self.path.display())
                });
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable cache file {}: {e}",
                    self.path.display()
                );
                Ok(HashMap::new())
            }
        }
    }

    async fn store(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        let bytes = serde_json::to_vec(entries).context("Failed to serialize cache entries")?;
        let path = self.path.clone();

        task::spawn_blocking(move || replace_file(&path, &bytes)).await??;
        Ok(())
    }
}

/// Writes `bytes` to a temporary file next to `path`, then renames it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary cache file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .context("Failed to write temporary cache file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write cache file: {}", path.display()))?;

    Ok(())
}

#[async_trait]
impl CacheStore for FileCache {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.load().await?;
        let hit = entries
            .get(key)
            .filter(|entry| entry.is_fresh(Utc::now()))
            .map(|entry| entry.value.clone());

        if hit.is_none() {
            tracing::debug!(key, "Cache miss");
        }
        Ok(hit)
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let mut entries = self.load().await?;
        entries.retain(|_, entry| entry.is_fresh(now));
        entries.insert(key.to_string(), StoredEntry::new(value, ttl)?);
        self.store(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn memory_cache_returns_fresh_entries() {
        let cache = MemoryCache::new();
        cache.write("forecast_10001", json!({ "a": 1 }), TTL).await.unwrap();

        assert_eq!(cache.read("forecast_10001").await.unwrap(), Some(json!({ "a": 1 })));
        assert_eq!(cache.read("forecast_99999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_drops_expired_entries() {
        let cache = MemoryCache::new();
        cache.write("k", json!(1), Duration::ZERO).await.unwrap();

        assert_eq!(cache.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_last_write_wins() {
        let cache = MemoryCache::new();
        cache.write("k", json!("first"), TTL).await.unwrap();
        cache.write("k", json!("second"), TTL).await.unwrap();

        assert_eq!(cache.read("k").await.unwrap(), Some(json!("second")));
    }

    #[tokio::test]
    async fn file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        FileCache::in_dir(dir.path())
            .write("forecast_10001", json!({ "temp": 72 }), TTL)
            .await
            .unwrap();

        let reopened = FileCache::in_dir(dir.path());
        assert_eq!(
            reopened.read("forecast_10001").await.unwrap(),
            Some(json!({ "temp": 72 }))
        );
    }

    #[tokio::test]
    async fn file_cache_missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join(CACHE_FILE_NAME));

        assert_eq!(cache.read("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_cache_expired_entry_is_a_miss_and_gets_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path());

        cache.write("old", json!(1), Duration::ZERO).await.unwrap();
        assert_eq!(cache.read("old").await.unwrap(), None);

        cache.write("new", json!(2), TTL).await.unwrap();
        let raw = std::fs::read_to_string(cache.path()).unwrap();
        assert!(!raw.contains("\"old\""));
        assert!(raw.contains("\"new\""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn file_cache_keeps_every_key_under_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::in_dir(dir.path()));

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .write(&format!("forecast_{i}"), json!({ "n": i }), TTL)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..40 {
            assert_eq!(
                cache.read(&format!("forecast_{i}")).await.unwrap(),
                Some(json!({ "n": i })),
                "forecast_{i} lost"
            );
        }
    }

    #[tokio::test]
    async fn file_cache_treats_corrupt_file_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::in_dir(dir.path());
        std::fs::write(cache.path(), b"not json").unwrap();

        assert_eq!(cache.read("k").await.unwrap(), None);

        cache.write("k", json!("v"), TTL).await.unwrap();
        assert_eq!(cache.read("k").await.unwrap(), Some(json!("v")));
    }
}
