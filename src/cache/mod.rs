//! 带 TTL 的内存缓存，内建 per-key 回源锁，用于池子链上状态。

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: Arc<V>,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// 并发安全的 TTL 缓存；同一 key 的并发未命中只回源一次。
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    ttl: Option<Duration>,
    entries: DashMap<K, Entry<V>>,
    locks: DashMap<K, Arc<tokio::sync::Mutex<()>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    /// `ttl` 为 `None` 或零时条目永不过期。
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl: ttl.filter(|value| !value.is_zero()),
            entries: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        value
    }

    pub async fn load_or_fetch<F, Fut, E>(&self, key: K, fetcher: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let value = fetcher(key.clone()).await?;
        Ok(self.insert(key, value))
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.locks.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
