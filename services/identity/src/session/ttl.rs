//! Key/value store with per-entry expiry.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[async_trait]
pub trait TtlStore: Send + Sync {
    /// A zero `ttl` stores an entry that is already expired.
    async fn put(&self, key: &str, value: String, ttl: Duration);
    async fn get(&self, key: &str) -> Option<String>;
    async fn delete(&self, key: &str) -> Option<String>;
}

#[derive(Debug)]
struct TtlEntry {
    value: String,
    expires_at: Instant,
}

/// Entries are expired lazily when read; [`InMemoryTtlStore::sweep`] drops
/// the rest.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTtlStore {
    inner: Arc<RwLock<HashMap<String, TtlEntry>>>,
}

impl InMemoryTtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        before - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl TtlStore for InMemoryTtlStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.inner
            .write()
            .await
            .insert(key.to_string(), TtlEntry { value, expires_at });
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.write().await;
        let expired = match guard.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.remove(key);
        }
        None
    }

    async fn delete(&self, key: &str) -> Option<String> {
        self.inner.write().await.remove(key).map(|entry| entry.value)
    }
}
