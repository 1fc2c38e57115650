use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use oficio_kv::KvClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Read-through profile cache with background refresh.
///
/// On a hit the caller gets the cached value immediately and a detached task
/// re-fetches from the source of truth; on a miss the fetch runs inline.
/// After a profile mutation callers re-populate with `store` (write-through)
/// rather than invalidating.
#[derive(Clone)]
pub struct ProfileCache {
    kv: KvClient,
    ttl: Duration,
    refreshing: Arc<DashMap<String, ()>>,
}

impl ProfileCache {
    pub fn new(kv: KvClient, ttl: Duration) -> Self {
        Self {
            kv,
            ttl,
            refreshing: Arc::new(DashMap::new()),
        }
    }

    /// Cached value, refreshed in the background on hit; fetched inline and
    /// populated on miss. `fetch` returning `None` (source error or absent
    /// row) leaves the cache untouched.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        if let Some(cached) = self.kv.get_json::<T>(key).await {
            self.spawn_refresh(key.to_string(), fetch);
            return Some(cached);
        }
        let fresh = fetch().await?;
        self.kv.set_json(key, &fresh, Some(self.ttl)).await;
        Some(fresh)
    }

    /// Write-through after a mutation of the underlying profile.
    pub async fn store<T: Serialize>(&self, key: &str, value: &T) {
        self.kv.set_json(key, value, Some(self.ttl)).await;
    }

    pub async fn evict(&self, key: &str) {
        self.kv.delete(key).await;
    }

    fn spawn_refresh<T, F, Fut>(&self, key: String, fetch: F)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        // One refresh in flight per key; extra hits skip the spawn.
        if self.refreshing.insert(key.clone(), ()).is_some() {
            return;
        }
        let kv = self.kv.clone();
        let ttl = self.ttl;
        let refreshing = Arc::clone(&self.refreshing);
        tokio::spawn(async move {
            if let Some(fresh) = fetch().await {
                kv.set_json(&key, &fresh, Some(ttl)).await;
                debug!(%key, "profile cache refreshed");
            }
            refreshing.remove(&key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    #[tokio::test]
    async fn miss_fetches_and_populates() {
        let cache = ProfileCache::new(KvClient::detached(), Duration::from_secs(60));
        let got = cache
            .get_or_fetch("customer_profile:1", || async {
                Some(Profile { name: "Ana".into() })
            })
            .await;
        assert_eq!(got.unwrap().name, "Ana");

        // Second read is served from cache even if the source now fails.
        let got = cache
            .get_or_fetch("customer_profile:1", || async { None::<Profile> })
            .await;
        assert_eq!(got.unwrap().name, "Ana");
    }

    #[tokio::test]
    async fn hit_triggers_background_refresh() {
        let cache = ProfileCache::new(KvClient::detached(), Duration::from_secs(60));
        cache
            .store("customer_profile:2", &Profile { name: "old".into() })
            .await;

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let got = cache
            .get_or_fetch("customer_profile:2", || async {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Some(Profile { name: "new".into() })
            })
            .await;
        // Caller sees the cached value immediately.
        assert_eq!(got.unwrap().name, "old");

        // The detached refresh lands shortly after.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        let refreshed = cache
            .get_or_fetch("customer_profile:2", || async { None::<Profile> })
            .await;
        assert_eq!(refreshed.unwrap().name, "new");
    }

    #[tokio::test]
    async fn fetch_failure_on_miss_returns_none() {
        let cache = ProfileCache::new(KvClient::detached(), Duration::from_secs(60));
        let got: Option<Profile> = cache
            .get_or_fetch("customer_profile:3", || async { None })
            .await;
        assert!(got.is_none());
    }
}
