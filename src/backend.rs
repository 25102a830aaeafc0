//! Backend Capability
//!
//! The key-value contract shared by every storage component: the in-memory
//! store, external network adapters, the tier controller and the cache
//! façade itself.
//!
//! Every operation takes a [`CancellationToken`]. In-memory implementations
//! never block and ignore it; composing implementations hand it unchanged to
//! each inner call so network-backed backends can honour cancellation and
//! deadlines.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStats;
use crate::error::Result;

/// Key-value storage over opaque byte payloads with per-key TTL.
///
/// A `ttl` of `None` (or zero) means "use the implementation's default".
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches a value; a miss is `CacheError::NotFound`.
    async fn get(&self, cancel: &CancellationToken, key: &str) -> Result<Bytes>;

    async fn set(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Removes a key. Deleting an absent key is not an error.
    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<()>;

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> Result<bool>;

    /// Fetches several keys; misses are simply absent from the result.
    async fn get_multi(
        &self,
        cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, Bytes>>;

    async fn set_multi(
        &self,
        cancel: &CancellationToken,
        items: HashMap<String, Bytes>,
        ttl: Option<Duration>,
    ) -> Result<()>;

    async fn delete_multi(&self, cancel: &CancellationToken, keys: &[String]) -> Result<()>;

    /// Adds `delta` to the integer stored under `key` and returns the result.
    async fn increment(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64>;

    async fn decrement(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64>;

    /// Replaces the expiration of a live key; `None` removes it.
    async fn expire(
        &self,
        cancel: &CancellationToken,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Remaining time to live; `None` when the key never expires.
    async fn ttl(&self, cancel: &CancellationToken, key: &str) -> Result<Option<Duration>>;

    async fn clear(&self, cancel: &CancellationToken) -> Result<()>;

    async fn stats(&self, cancel: &CancellationToken) -> Result<CacheStats>;

    async fn health(&self, cancel: &CancellationToken) -> Result<()>;

    /// Releases background resources. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}
