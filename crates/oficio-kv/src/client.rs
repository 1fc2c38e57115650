use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

const CONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
enum MemoryValue {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// KV access with a per-process fallback map.
///
/// The fallback is unshared between nodes; that yields per-node stickiness
/// on distributed deployments, which the orchestrator tolerates because it
/// re-reads state on every turn. Cheap to clone — both halves are shared.
#[derive(Clone)]
pub struct KvClient {
    redis: Option<ConnectionManager>,
    memory: Arc<DashMap<String, MemoryEntry>>,
}

impl KvClient {
    /// Connect to Redis with a few retries; on failure run on the fallback
    /// map alone. Never errors — degraded mode is a supported configuration.
    pub async fn connect(url: Option<&str>) -> Self {
        let mut redis = None;
        if let Some(url) = url {
            for attempt in 1..=CONNECT_ATTEMPTS {
                match Self::open(url).await {
                    Ok(manager) => {
                        tracing::info!("connected to redis");
                        redis = Some(manager);
                        break;
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "redis connect failed");
                        if attempt < CONNECT_ATTEMPTS {
                            tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                        }
                    }
                }
            }
            if redis.is_none() {
                warn!("redis unreachable, using in-process fallback storage");
            }
        } else {
            debug!("no redis url configured, using in-process storage");
        }
        Self {
            redis,
            memory: Arc::new(DashMap::new()),
        }
    }

    async fn open(url: &str) -> redis::RedisResult<ConnectionManager> {
        let client = redis::Client::open(url)?;
        ConnectionManager::new(client).await
    }

    /// Pure in-memory client, used by tests and by deployments without Redis.
    pub fn detached() -> Self {
        Self {
            redis: None,
            memory: Arc::new(DashMap::new()),
        }
    }

    /// True when a live Redis connection answers PING.
    pub async fn ping(&self) -> bool {
        match self.redis.clone() {
            Some(mut conn) => {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong.is_ok()
            }
            None => false,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "stored value failed to decode");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "value failed to encode, write dropped");
                return;
            }
        };
        self.set_raw(key, raw, ttl).await;
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(mut conn) = self.redis.clone() {
            match conn.get::<_, Option<String>>(key).await {
                Ok(found) => return found,
                Err(e) => warn!(key, error = %e, "redis GET failed, trying fallback"),
            }
        }
        self.memory_get(key)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) {
        if let Some(mut conn) = self.redis.clone() {
            let result = match ttl {
                Some(ttl) => {
                    conn.set_ex::<_, _, ()>(key, &value, ttl.as_secs().max(1))
                        .await
                }
                None => conn.set::<_, _, ()>(key, &value).await,
            };
            match result {
                Ok(()) => return,
                Err(e) => warn!(key, error = %e, "redis SET failed, using fallback"),
            }
        }
        self.memory.insert(
            key.to_string(),
            MemoryEntry {
                value: MemoryValue::Text(value),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        if let Some(mut conn) = self.redis.clone() {
            if let Err(e) = conn.del::<_, ()>(key).await {
                warn!(key, error = %e, "redis DEL failed");
            }
        }
        // The fallback copy goes regardless, so a later degraded read
        // cannot resurrect deleted state.
        self.memory.remove(key);
    }

    /// Fetch several keys at once. Missing and undecodable entries are
    /// simply absent from the result.
    pub async fn mget_json<T: DeserializeOwned>(&self, keys: &[String]) -> HashMap<String, T> {
        let mut out = HashMap::new();
        if keys.is_empty() {
            return out;
        }
        if let Some(mut conn) = self.redis.clone() {
            match conn.mget::<_, Vec<Option<String>>>(keys).await {
                Ok(values) => {
                    for (key, raw) in keys.iter().zip(values) {
                        if let Some(raw) = raw {
                            if let Ok(v) = serde_json::from_str(&raw) {
                                out.insert(key.clone(), v);
                            }
                        }
                    }
                    return out;
                }
                Err(e) => warn!(error = %e, "redis MGET failed, trying fallback"),
            }
        }
        for key in keys {
            if let Some(raw) = self.memory_get(key) {
                if let Ok(v) = serde_json::from_str(&raw) {
                    out.insert(key.clone(), v);
                }
            }
        }
        out
    }

    /// All keys starting with `prefix`.
    pub async fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        if let Some(mut conn) = self.redis.clone() {
            let pattern = format!("{}*", prefix);
            match conn.scan_match::<_, String>(&pattern).await {
                Ok(mut iter) => {
                    let mut keys = Vec::new();
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                    return keys;
                }
                Err(e) => warn!(prefix, error = %e, "redis SCAN failed, trying fallback"),
            }
        }
        self.memory
            .iter()
            .filter(|entry| !entry.value().expired() && entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Push onto the head of a capped list, trimming to `cap` entries and
    /// refreshing the TTL. Newest entry first.
    pub async fn list_push_capped(&self, key: &str, value: String, cap: usize, ttl: Duration) {
        if let Some(mut conn) = self.redis.clone() {
            let pushed: redis::RedisResult<()> = async {
                conn.lpush::<_, _, ()>(key, &value).await?;
                conn.ltrim::<_, ()>(key, 0, cap as isize - 1).await?;
                conn.expire::<_, ()>(key, ttl.as_secs() as i64).await?;
                Ok(())
            }
            .await;
            match pushed {
                Ok(()) => return,
                Err(e) => warn!(key, error = %e, "redis LPUSH failed, using fallback"),
            }
        }
        let mut entry = self
            .memory
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: MemoryValue::List(VecDeque::new()),
                expires_at: None,
            });
        if entry.expired() {
            entry.value = MemoryValue::List(VecDeque::new());
        }
        if let MemoryValue::List(ref mut list) = entry.value {
            list.push_front(value);
            list.truncate(cap);
        }
        entry.expires_at = Some(Instant::now() + ttl);
    }

    /// Up to `limit` entries from the head of a list (newest first).
    pub async fn list_range(&self, key: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        if let Some(mut conn) = self.redis.clone() {
            match conn
                .lrange::<_, Vec<String>>(key, 0, limit as isize - 1)
                .await
            {
                Ok(items) => return items,
                Err(e) => warn!(key, error = %e, "redis LRANGE failed, trying fallback"),
            }
        }
        match self.memory.get(key) {
            Some(entry) if !entry.expired() => match &entry.value {
                MemoryValue::List(list) => list.iter().take(limit).cloned().collect(),
                MemoryValue::Text(_) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    pub async fn list_len(&self, key: &str) -> usize {
        if let Some(mut conn) = self.redis.clone() {
            match conn.llen::<_, usize>(key).await {
                Ok(n) => return n,
                Err(e) => warn!(key, error = %e, "redis LLEN failed, trying fallback"),
            }
        }
        match self.memory.get(key) {
            Some(entry) if !entry.expired() => match &entry.value {
                MemoryValue::List(list) => list.len(),
                MemoryValue::Text(_) => 0,
            },
            _ => 0,
        }
    }

    fn memory_get(&self, key: &str) -> Option<String> {
        let entry = self.memory.get(key)?;
        if entry.expired() {
            drop(entry);
            self.memory.remove(key);
            return None;
        }
        match &entry.value {
            MemoryValue::Text(text) => Some(text.clone()),
            MemoryValue::List(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let kv = KvClient::detached();
        kv.set_json("k", &json!({"a": 1}), None).await;
        let v: serde_json::Value = kv.get_json("k").await.unwrap();
        assert_eq!(v["a"], 1);
        kv.delete("k").await;
        assert!(kv.get_json::<serde_json::Value>("k").await.is_none());
    }

    #[tokio::test]
    async fn ttl_expires_in_fallback() {
        let kv = KvClient::detached();
        kv.set_json("t", &json!(1), Some(Duration::from_millis(20))).await;
        assert!(kv.get_json::<serde_json::Value>("t").await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(kv.get_json::<serde_json::Value>("t").await.is_none());
    }

    #[tokio::test]
    async fn capped_list_keeps_newest() {
        let kv = KvClient::detached();
        for i in 0..7 {
            kv.list_push_capped("l", format!("m{}", i), 5, Duration::from_secs(60))
                .await;
        }
        let items = kv.list_range("l", 10).await;
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], "m6");
        assert_eq!(items[4], "m2");
        assert_eq!(kv.list_len("l").await, 5);
    }

    #[tokio::test]
    async fn scan_prefix_filters() {
        let kv = KvClient::detached();
        kv.set_json("session:1", &json!(1), None).await;
        kv.set_json("session:2", &json!(2), None).await;
        kv.set_json("flow:1", &json!(3), None).await;
        let mut keys = kv.scan_prefix("session:").await;
        keys.sort();
        assert_eq!(keys, vec!["session:1", "session:2"]);
    }

    #[tokio::test]
    async fn mget_skips_missing() {
        let kv = KvClient::detached();
        kv.set_json("a", &json!(1), None).await;
        let got: HashMap<String, serde_json::Value> = kv
            .mget_json(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(got.len(), 1);
        assert!(got.contains_key("a"));
    }
}
