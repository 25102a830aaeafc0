//! Tier Controller
//!
//! Composes two caches into a read-through / write-through L1/L2 hierarchy.
//! L1 and L2 calls run one after the other; promotion depends on the L2 read
//! and writes are fail-fast on L1.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::CacheStats;
use crate::config::DEFAULT_PROMOTION_TTL;
use crate::error::{CacheError, Result, Tier};

pub struct TierController {
    l1: Arc<dyn Backend>,
    l2: Arc<dyn Backend>,
    promotion_ttl: Duration,
}

impl TierController {
    /// `promotion_ttl` of None (or zero) falls back to five minutes.
    pub fn new(
        l1: Arc<dyn Backend>,
        l2: Arc<dyn Backend>,
        promotion_ttl: Option<Duration>,
    ) -> Self {
        Self {
            l1,
            l2,
            promotion_ttl: promotion_ttl
                .filter(|ttl| !ttl.is_zero())
                .unwrap_or(DEFAULT_PROMOTION_TTL),
        }
    }

    /// Direct access to the L1 tier, bypassing promotion.
    pub fn l1(&self) -> &Arc<dyn Backend> {
        &self.l1
    }

    /// Direct access to the L2 tier.
    pub fn l2(&self) -> &Arc<dyn Backend> {
        &self.l2
    }

    pub fn promotion_ttl(&self) -> Duration {
        self.promotion_ttl
    }
}

/// Keeps the first error of two independent attempts.
fn first_error(first: Result<()>, second: Result<()>) -> Result<()> {
    first.and(second)
}

#[async_trait]
impl Backend for TierController {
    async fn get(&self, cancel: &CancellationToken, key: &str) -> Result<Bytes> {
        match self.l1.get(cancel, key).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_not_found() => {}
            Err(e) => debug!(key = %key, error = %e, "L1 read failed, falling back to L2"),
        }

        let value = self.l2.get(cancel, key).await?;
        if let Err(e) = self
            .l1
            .set(cancel, key, value.clone(), Some(self.promotion_ttl))
            .await
        {
            warn!(key = %key, error = %e, "Promotion into L1 failed");
        }
        Ok(value)
    }

    /// Writes L1 then L2. An L2 failure after a successful L1 write leaves the
    /// value in L1 only and is reported as `PartialTierFailure`.
    async fn set(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.l1.set(cancel, key, value.clone(), ttl).await?;
        self.l2
            .set(cancel, key, value, ttl)
            .await
            .map_err(|e| CacheError::PartialTierFailure {
                tier: Tier::L2,
                source: Box::new(e),
            })
    }

    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<()> {
        let l1 = self.l1.delete(cancel, key).await;
        let l2 = self.l2.delete(cancel, key).await;
        match (l1, l2) {
            (Err(e), Err(_)) => Err(e),
            _ => Ok(()),
        }
    }

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> Result<bool> {
        if let Ok(true) = self.l1.exists(cancel, key).await {
            return Ok(true);
        }
        self.l2.exists(cancel, key).await
    }

    async fn get_multi(
        &self,
        cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, Bytes>> {
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
        for (key, value) in items {
            self.set(cancel, &key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete_multi(&self, cancel: &CancellationToken, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete(cancel, key).await?;
        }
        Ok(())
    }

    // Counters live in L2 only.
    async fn increment(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.l2.increment(cancel, key, delta).await
    }

    async fn decrement(&self, cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.l2.decrement(cancel, key, delta).await
    }

    async fn expire(
        &self,
        _cancel: &CancellationToken,
        _key: &str,
        _ttl: Option<Duration>,
    ) -> Result<()> {
        Err(CacheError::UnsupportedOperation(
            "expire is not supported in hierarchical mode".to_string(),
        ))
    }

    async fn ttl(&self, _cancel: &CancellationToken, _key: &str) -> Result<Option<Duration>> {
        Err(CacheError::UnsupportedOperation(
            "ttl is not supported in hierarchical mode".to_string(),
        ))
    }

    async fn clear(&self, cancel: &CancellationToken) -> Result<()> {
        let l1 = self.l1.clear(cancel).await;
        let l2 = self.l2.clear(cancel).await;
        first_error(l1, l2)
    }

    async fn stats(&self, cancel: &CancellationToken) -> Result<CacheStats> {
        let mut stats = self.l1.stats(cancel).await?;
        stats.merge(&self.l2.stats(cancel).await?);
        Ok(stats)
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<()> {
        let l1 = self.l1.health(cancel).await;
        let l2 = self.l2.health(cancel).await;
        first_error(l1, l2)
    }

    async fn close(&self) -> Result<()> {
        let l1 = self.l1.close().await;
        let l2 = self.l2.close().await;
        first_error(l1, l2)
    }
}
