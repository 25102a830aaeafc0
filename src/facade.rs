//! Cache Façade
//!
//! Single entry point over the three operating modes. The mode is fixed at
//! construction; every call is dispatched to one backend, one shard or the
//! tier controller. Payloads pass through the configured compressor on the
//! way in and out, and the typed helpers add the configured serializer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cache::{CacheStats, MemoryStore};
use crate::codec::{CompressorKind, SerializerKind};
use crate::config::{BackendConfig, CacheMode, Config};
use crate::error::{CacheError, Result};
use crate::sharding::ShardRouter;
use crate::tier::TierController;

// == Mode ==
pub enum Mode {
    Single(Arc<dyn Backend>),
    Sharded(ShardRouter),
    Hierarchical(TierController),
}

impl Mode {
    pub fn kind(&self) -> CacheMode {
        match self {
            Mode::Single(_) => CacheMode::Single,
            Mode::Sharded(_) => CacheMode::Sharded,
            Mode::Hierarchical(_) => CacheMode::Hierarchical,
        }
    }
}

// == Cache ==
pub struct Cache {
    mode: Mode,
    serializer: SerializerKind,
    compressor: CompressorKind,
}

/// Builds the backend described by `config`.
pub fn build_backend(config: &BackendConfig) -> Arc<dyn Backend> {
    match config {
        BackendConfig::Memory(memory) => Arc::new(MemoryStore::new(memory.clone())),
    }
}

impl Cache {
    // == Constructors ==
    /// Builds a cache from a validated configuration.
    ///
    /// In hierarchical mode each tier is itself a single-mode cache that
    /// applies the configured compressor; the outer cache stores payloads as
    /// the tiers hand them back.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let cache = match config.mode {
            CacheMode::Single => Self::with_backend(build_backend(&config.backend))
                .with_compressor(config.compressor),
            CacheMode::Sharded => {
                let shards = (0..config.sharding.shards)
                    .map(|_| build_backend(&config.backend))
                    .collect();
                let router = ShardRouter::with_shards(
                    config.sharding.algorithm,
                    config.sharding.replicas,
                    shards,
                );
                Self::sharded(router).with_compressor(config.compressor)
            }
            CacheMode::Hierarchical => {
                let l1 = Cache::new(&config.single(config.l1.clone()))?;
                let l2 = Cache::new(&config.single(config.l2.clone()))?;
                Self::hierarchical(TierController::new(
                    Arc::new(l1),
                    Arc::new(l2),
                    config.promotion_ttl,
                ))
            }
        };

        info!(
            "Cache initialized: mode={}, serializer={}, compression={}",
            config.mode, config.serializer, config.compressor
        );
        Ok(cache.with_serializer(config.serializer))
    }

    /// Single-mode cache over any backend.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::from_mode(Mode::Single(backend))
    }

    pub fn sharded(router: ShardRouter) -> Self {
        Self::from_mode(Mode::Sharded(router))
    }

    pub fn hierarchical(tiers: TierController) -> Self {
        Self::from_mode(Mode::Hierarchical(tiers))
    }

    fn from_mode(mode: Mode) -> Self {
        Self {
            mode,
            serializer: SerializerKind::default(),
            compressor: CompressorKind::default(),
        }
    }

    pub fn with_serializer(mut self, serializer: SerializerKind) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorKind) -> Self {
        self.compressor = compressor;
        self
    }

    // == Accessors ==
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn serializer(&self) -> SerializerKind {
        self.serializer
    }

    pub fn compressor(&self) -> CompressorKind {
        self.compressor
    }

    pub fn shard_router(&self) -> Option<&ShardRouter> {
        match &self.mode {
            Mode::Sharded(router) => Some(router),
            _ => None,
        }
    }

    /// Topology changes need exclusive access to the whole cache.
    pub fn shard_router_mut(&mut self) -> Option<&mut ShardRouter> {
        match &mut self.mode {
            Mode::Sharded(router) => Some(router),
            _ => None,
        }
    }

    pub fn tiers(&self) -> Option<&TierController> {
        match &self.mode {
            Mode::Hierarchical(tiers) => Some(tiers),
            _ => None,
        }
    }

    // == Dispatch ==
    /// Backend responsible for `key` in the current mode.
    fn target(&self, key: &str) -> Result<&dyn Backend> {
        match &self.mode {
            Mode::Single(backend) => Ok(&**backend),
            Mode::Sharded(router) => router
                .get_shard(key)
                .map(|shard| &**shard)
                .ok_or_else(|| CacheError::ShardUnavailable("no shards configured".to_string())),
            Mode::Hierarchical(tiers) => Ok(tiers as &dyn Backend),
        }
    }

    fn unsupported(&self, operation: &str) -> CacheError {
        CacheError::UnsupportedOperation(format!(
            "{} is not supported in {} mode",
            operation,
            self.mode.kind()
        ))
    }

    // == Conditional Writes ==
    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    ///
    /// Check-then-set: a concurrent writer may slip in between.
    pub async fn set_nx(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        if self.exists(cancel, key).await? {
            return Ok(false);
        }
        self.set(cancel, key, value, ttl).await?;
        Ok(true)
    }

    /// Stores `value` with the default TTL and returns the previous value.
    pub async fn get_set(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: Bytes,
    ) -> Result<Option<Bytes>> {
        let previous = match self.get(cancel, key).await {
            Ok(old) => Some(old),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        self.set(cancel, key, value, None).await?;
        Ok(previous)
    }

    // == Typed Helpers ==
    pub async fn get_value<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<T> {
        let raw = self.get(cancel, key).await?;
        self.serializer.deserialize(&raw)
    }

    pub async fn set_value<T: Serialize + Sync + ?Sized>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = self.serializer.serialize(value)?;
        self.set(cancel, key, raw, ttl).await
    }

    pub async fn get_multi_values<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, T>> {
        self.get_multi(cancel, keys)
            .await?
            .into_iter()
            .map(|(key, raw)| self.serializer.deserialize(&raw).map(|value| (key, value)))
            .collect()
    }

    pub async fn set_multi_values<T: Serialize + Sync>(
        &self,
        cancel: &CancellationToken,
        items: &HashMap<String, T>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let encoded = items
            .iter()
            .map(|(key, value)| self.serializer.serialize(value).map(|raw| (key.clone(), raw)))
            .collect::<Result<HashMap<_, _>>>()?;
        self.set_multi(cancel, encoded, ttl).await
    }
}

#[async_trait]
impl Backend for Cache {
    async fn get(&self, cancel: &CancellationToken, key: &str) -> Result<Bytes> {
        let raw = self.target(key)?.get(cancel, key).await?;
        self.compressor.decompress(raw)
    }

    async fn set(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let packed = self.compressor.compress(value)?;
        self.target(key)?.set(cancel, key, packed, ttl).await
    }

    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<()> {
        self.target(key)?.delete(cancel, key).await
    }

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> Result<bool> {
        self.target(key)?.exists(cancel, key).await
    }

    async fn get_multi(
        &self,
        cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, Bytes>> {
        if let Mode::Single(backend) = &self.mode {
            return backend
                .get_multi(cancel, keys)
                .await?
                .into_iter()
                .map(|(key, raw)| self.compressor.decompress(raw).map(|value| (key, value)))
                .collect();
        }

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(cancel, key).await {
                Ok(value) => {
                    found.insert(key.clone(), value);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    async fn set_multi(
        &self,
        cancel: &CancellationToken,
        items: HashMap<String, Bytes>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        if let Mode::Single(backend) = &self.mode {
            let packed = items
                .into_iter()
                .map(|(key, value)| self.compressor.compress(value).map(|packed| (key, packed)))
                .collect::<Result<HashMap<_, _>>>()?;
            return backend.set_multi(cancel, packed, ttl).await;
        }

        for (key, value) in items {
            self.set(cancel, &key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete_multi(&self, cancel: &CancellationToken, keys: &[String]) -> Result<()> {
        if let Mode::Single(backend) = &self.mode {
            return backend.delete_multi(cancel, keys).await;
        }

        for key in keys {
            self.delete(cancel, key).await?;
        }
        Ok(())
    }

    // Counters are stored as plain decimal text and skip the compressor.
    async fn increment(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.target(key)?.increment(cancel, key, delta).await
    }

    async fn decrement(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.target(key)?.decrement(cancel, key, delta).await
    }

    async fn expire(
        &self,
        cancel: &CancellationToken,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        match &self.mode {
            Mode::Single(backend) => backend.expire(cancel, key, ttl).await,
            _ => Err(self.unsupported("expire")),
        }
    }

    async fn ttl(&self, cancel: &CancellationToken, key: &str) -> Result<Option<Duration>> {
        match &self.mode {
            Mode::Single(backend) => backend.ttl(cancel, key).await,
            _ => Err(self.unsupported("ttl")),
        }
    }

    async fn clear(&self, cancel: &CancellationToken) -> Result<()> {
        match &self.mode {
            Mode::Single(backend) => backend.clear(cancel).await,
            Mode::Sharded(router) => {
                for shard in router.shards() {
                    shard.clear(cancel).await?;
                }
                Ok(())
            }
            Mode::Hierarchical(tiers) => tiers.clear(cancel).await,
        }
    }

    async fn stats(&self, cancel: &CancellationToken) -> Result<CacheStats> {
        match &self.mode {
            Mode::Single(backend) => backend.stats(cancel).await,
            Mode::Sharded(router) => {
                let mut total = CacheStats::new();
                for (index, shard) in router.shards().iter().enumerate() {
                    match shard.stats(cancel).await {
                        Ok(stats) => total.merge(&stats),
                        Err(e) => debug!(shard = index, error = %e, "Skipping shard stats"),
                    }
                }
                Ok(total)
            }
            Mode::Hierarchical(tiers) => tiers.stats(cancel).await,
        }
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<()> {
        match &self.mode {
            Mode::Single(backend) => backend.health(cancel).await,
            Mode::Sharded(router) => {
                for (index, shard) in router.shards().iter().enumerate() {
                    shard.health(cancel).await.map_err(|e| {
                        CacheError::ShardUnavailable(format!("shard {} unhealthy: {}", index, e))
                    })?;
                }
                Ok(())
            }
            Mode::Hierarchical(tiers) => tiers.health(cancel).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match &self.mode {
            Mode::Single(backend) => backend.close().await,
            Mode::Sharded(router) => {
                let mut first = Ok(());
                for shard in router.shards() {
                    let result = shard.close().await;
                    first = first.and(result);
                }
                first
            }
            Mode::Hierarchical(tiers) => tiers.close().await,
        }
    }
}
