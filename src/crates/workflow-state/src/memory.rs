//! In-process state store
//!
//! A guarded map keyed by string holding `(value, optional_expiry)`.
//! Expiry is enforced lazily on read, plus an optional background sweeper
//! for keys nobody reads again. Used in dev/test, following the same shape
//! as `langgraph_checkpoint::memory::InMemoryCheckpointSaver`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{Result, StateError};
use crate::store::StateStore;

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }
}

type Map = Arc<RwLock<HashMap<String, Entry>>>;

/// In-process [`StateStore`] backed by a `tokio::sync::RwLock<HashMap<..>>`.
#[derive(Debug, Clone)]
pub struct InProcessStore {
    map: Map,
    sweeper: Option<Arc<JoinHandle<()>>>,
}

impl InProcessStore {
    /// Create a store with no background sweeper; expired keys are reaped
    /// lazily on read.
    pub fn new() -> Self {
        Self {
            map: Arc::new(RwLock::new(HashMap::new())),
            sweeper: None,
        }
    }

    /// Create a store with a background task that sweeps expired keys every
    /// `interval`, in addition to lazy reaping on read.
    pub fn with_sweeper(interval: Duration) -> Self {
        let map: Map = Arc::new(RwLock::new(HashMap::new()));
        let sweep_map = map.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut guard = sweep_map.write().await;
                guard.retain(|_, entry| !entry.is_expired());
            }
        });
        Self {
            map,
            sweeper: Some(Arc::new(handle)),
        }
    }

    /// Number of live (possibly-expired-but-not-yet-reaped) keys.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }
}

impl Default for InProcessStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InProcessStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            if let Ok(handle) = Arc::try_unwrap(handle) {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl StateStore for InProcessStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let guard = self.map.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.map
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.map.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let guard = self.map.read().await;
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = guard.get(key) {
                if !entry.is_expired() {
                    out.insert(key.clone(), entry.value.clone());
                }
            }
        }
        Ok(out)
    }

    async fn set_many(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        let mut guard = self.map.write().await;
        for (key, value) in items {
            guard.insert(key, Entry { value, expires_at });
        }
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut guard = self.map.write().await;
        let entry = guard.entry(key.to_string()).or_insert(Entry {
            value: Value::from(0_i64),
            expires_at: None,
        });
        let current = entry
            .value
            .as_i64()
            .ok_or_else(|| StateError::NotAnInteger(key.to_string()))?;
        let next = current + delta;
        entry.value = Value::from(next);
        Ok(next)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_on_missing_key_is_not_an_error() {
        let store = InProcessStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stored_null_is_distinct_from_missing() {
        let store = InProcessStore::new();
        store.set("k", Value::Null, None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Value::Null));
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ttl_expires_lazily() {
        let store = InProcessStore::new();
        store
            .set("k", json!("v"), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!("v")));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn increment_starts_from_zero_and_is_cumulative() {
        let store = InProcessStore::new();
        assert_eq!(store.increment("counter", 5).await.unwrap(), 5);
        assert_eq!(store.increment("counter", 3).await.unwrap(), 8);
        assert_eq!(store.increment("counter", -10).await.unwrap(), -2);
    }

    #[tokio::test]
    async fn increment_is_linearizable_under_concurrency() {
        let store = Arc::new(InProcessStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment("shared", 1).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get("shared").await.unwrap(), Some(json!(50)));
    }

    #[tokio::test]
    async fn set_many_and_get_many_round_trip() {
        let store = InProcessStore::new();
        store
            .set_many(
                vec![("a".into(), json!(1)), ("b".into(), json!(2))],
                None,
            )
            .await
            .unwrap();
        let got = store.get_many(&["a".into(), "b".into(), "c".into()]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got.get("a"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InProcessStore::new();
        store.delete("never-existed").await.unwrap();
        store.set("k", json!(1), None).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }
}
