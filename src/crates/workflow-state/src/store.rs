//! The [`StateStore`] trait — §4.C1
//!
//! Two implementations share this trait: [`crate::memory::InProcessStore`]
//! (guarded map, used in dev/test) and [`crate::redis_store::RedisStore`]
//! (network-attached, used in staging/production). Both are safe for
//! concurrent use and serialize stored values as JSON — "a stable textual
//! encoding" per §4.C1.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Key/value persistence with TTL and atomic counters.
///
/// `Get` returning `Ok(None)` is the not-found sentinel; it is distinct from
/// a stored JSON `null`, which round-trips as `Ok(Some(Value::Null))`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the value stored at `key`, or `None` if it does not exist or
    /// has expired.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` at `key`. `ttl: None` means "never expires" on the
    /// in-process backend; on the network backend it means the key is set
    /// without an expiry (an "infinite key", per §4.C1).
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`, if present. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether `key` currently exists (and has not expired).
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Batch read. Keys with no stored value are omitted from the result
    /// rather than represented with a sentinel, since the map itself already
    /// distinguishes "absent".
    async fn get_many(&self, keys: &[String]) -> Result<std::collections::HashMap<String, Value>>;

    /// Batch write. Implementations should batch this where the backend
    /// supports it, but — per §4.C1 — it need not be atomic across keys.
    async fn set_many(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()>;

    /// Atomically add `delta` to the integer stored at `key` (treating a
    /// missing key as `0`) and return the new value. Must be linearizable
    /// relative to concurrent increments on the same key (§8 property 7).
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Release any resources held by this store (connections, background
    /// sweepers, ...).
    async fn close(&self) -> Result<()>;
}
