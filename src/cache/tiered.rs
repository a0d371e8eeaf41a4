use super::disk::DiskTier;
use super::memory::LruTier;
use super::vector::ContextVector;
use crate::config::Config;
use crate::error::StorageError;
use crate::reward::CacheKey;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Where a cached vector currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Memory,
    Disk,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub vector: ContextVector,
    pub storage_tier: StorageTier,
}

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHit {
    Memory,
    Disk,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub memory_entries: usize,
    pub memory_capacity: usize,
}

/// Count of background disk writes with a wakeup for when it reaches zero.
#[derive(Debug, Default)]
struct PendingWrites {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingWrites {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Bounded in-memory LRU in front of an unbounded on-disk store.
///
/// The memory lock is never held across an `.await`; disk I/O runs on the
/// blocking pool. Disk writes are fire-and-forget but counted so `flush` and
/// `clear` can wait for them.
pub struct TieredContextCache {
    memory: Mutex<LruTier>,
    disk: DiskTier,
    writes: Arc<PendingWrites>,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TieredContextCache {
    pub fn new(dir: impl Into<PathBuf>, memory_capacity: usize) -> Self {
        Self {
            memory: Mutex::new(LruTier::new(memory_capacity)),
            disk: DiskTier::new(dir),
            writes: Arc::new(PendingWrites::default()),
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache for the model described by `config`, rooted at its
    /// [`Config::context_cache_dir`].
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.context_cache_dir(), config.cache.memory_capacity)
    }

    pub fn disk(&self) -> &DiskTier {
        &self.disk
    }

    pub async fn get(&self, key: &CacheKey) -> Option<ContextVector> {
        self.lookup(key).await.map(|(vector, _)| vector)
    }

    /// Like `get`, also reporting which tier answered.
    pub async fn lookup(&self, key: &CacheKey) -> Option<(ContextVector, CacheHit)> {
        if let Some(vector) = self.get_memory(key) {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some((vector, CacheHit::Memory));
        }

        let disk = self.disk.clone();
        let lookup_key = key.clone();
        let read = tokio::task::spawn_blocking(move || disk.read(&lookup_key)).await;
        let result = match read {
            Ok(result) => result,
            Err(error) => Err(StorageError::Task(error.to_string())),
        };

        match result {
            Ok(Some(vector)) => {
                self.disk_hits.fetch_add(1, Ordering::Relaxed);
                self.insert_memory(key.clone(), vector.clone());
                Some((vector, CacheHit::Disk))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(error) => {
                tracing::warn!(error = %error, "disk cache read failed; treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Memory tier only; bumps recency on hit.
    pub fn get_memory(&self, key: &CacheKey) -> Option<ContextVector> {
        self.memory_lock().get(key)
    }

    /// Store in memory now and on disk in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn put(&self, key: CacheKey, vector: ContextVector) {
        self.insert_memory(key.clone(), vector.clone());

        let disk = self.disk.clone();
        let writes = Arc::clone(&self.writes);
        writes.begin();
        tokio::task::spawn_blocking(move || {
            if let Err(error) = disk.write(&key, &vector) {
                tracing::warn!(error = %error, "disk cache write failed; entry is memory-only");
            }
            writes.finish();
        });
    }

    /// Wait until no disk write is in progress.
    pub async fn flush(&self) {
        self.writes.wait_idle().await;
    }

    /// Empty both tiers. Entries written concurrently with a clear may or may
    /// not survive it.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        self.memory_lock().clear();
        self.flush().await;

        let disk = self.disk.clone();
        let removed = tokio::task::spawn_blocking(move || disk.clear())
            .await
            .map_err(|error| StorageError::Task(error.to_string()))??;

        // a lookup racing the clear may have promoted a doomed entry
        self.memory_lock().clear();
        tracing::info!(removed, "context cache cleared");
        Ok(removed)
    }

    /// Tier report for a key without touching recency.
    pub async fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let in_memory = self.memory_lock().peek(key);

        let disk = self.disk.clone();
        let lookup_key = key.clone();
        let on_disk = tokio::task::spawn_blocking(move || disk.read(&lookup_key))
            .await
            .ok()
            .and_then(Result::ok)
            .flatten();

        let storage_tier = match (in_memory.is_some(), on_disk.is_some()) {
            (true, true) => StorageTier::Both,
            (true, false) => StorageTier::Memory,
            _ => StorageTier::Disk,
        };
        let vector = in_memory.or(on_disk)?;
        Some(CacheEntry {
            key: key.clone(),
            vector,
            storage_tier,
        })
    }

    pub fn stats(&self) -> CacheStats {
        let memory = self.memory_lock();
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            memory_entries: memory.len(),
            memory_capacity: memory.capacity(),
        }
    }

    fn insert_memory(&self, key: CacheKey, vector: ContextVector) {
        let evicted = self.memory_lock().insert(key, vector);
        if let Some(evicted) = evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %evicted, "evicted context from memory tier");
        }
    }

    fn memory_lock(&self) -> std::sync::MutexGuard<'_, LruTier> {
        self.memory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TieredContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredContextCache")
            .field("dir", &self.disk.dir())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
