//! TTL-expiring in-memory rendezvous store
//!
//! The hand-off point between submission intake and deferred processing.
//! Entries are readable at most once: [`SnapshotStore::take`] removes the
//! entry under the same lock it reads it with, so two racing consumers of one
//! key see exactly one success and one `NotFound`.
//!
//! Expiry is checked on every `take`; the sweeper only reclaims memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Never stored, already consumed, or expired
    #[error("Snapshot not found: {0}")]
    NotFound(String),
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct SnapshotStore<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Send + 'static> SnapshotStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `value` under `key` for `ttl`; an existing entry is replaced
    pub async fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.insert(key.into(), entry);
    }

    /// Atomically remove and return the value for `key`
    pub async fn take(&self, key: &str) -> Result<V, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) if Instant::now() < entry.expires_at => Ok(entry.value),
            Some(_) => {
                tracing::debug!(key, "Snapshot expired before consumption");
                Err(StoreError::NotFound(key.to_string()))
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// Live (unexpired) entry count
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| now < e.expires_at)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }

    /// Periodically purge expired entries until `cancel` fires
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Snapshot sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = self.purge_expired().await;
                        if purged > 0 {
                            tracing::info!(purged, "Expired snapshots discarded without consumption");
                        }
                    }
                }
            }
        })
    }
}

impl<V: Send + 'static> Default for SnapshotStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
