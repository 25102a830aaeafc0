//! Cache Store Module
//!
//! In-process key-value table with TTL expiration, policy-driven eviction
//! under memory and key-count limits, and lock-free stats counters.
//!
//! One reader/writer lock guards the whole key space. Hits run under the
//! shared lock; writes, deletes, counters, evictions and sweeps take it
//! exclusively.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, EvictionPolicy, StatsCounters, MAX_KEY_LENGTH};
use crate::config::MemoryConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, ExpirySweep};

// == Table ==
/// Entries plus the running byte total; always mutated together.
#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, CacheEntry>,
    memory_usage: u64,
}

impl Table {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_usage -= entry.size() as u64;
        Some(entry)
    }

    fn remove_if_expired(&mut self, key: &str, now_ms: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now_ms));
        if expired {
            self.remove(key);
        }
        expired
    }

    fn live(&self, key: &str, now_ms: u64) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now_ms))
    }

    fn purge_expired(&mut self, now_ms: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Frees space: drops already-expired entries if there are any, otherwise
    /// evicts one live entry chosen by `policy`. Returns false when the table
    /// is empty.
    fn reclaim(&mut self, policy: EvictionPolicy, counters: &StatsCounters, now_ms: u64) -> bool {
        if self.purge_expired(now_ms) > 0 {
            return true;
        }

        match policy.select_victim(&self.entries) {
            Some(victim) => {
                self.remove(&victim);
                counters.record_eviction();
                debug!(key = %victim, policy = %policy, "Evicted entry");
                true
            }
            None => false,
        }
    }
}

// == Store State ==
/// Shared state of a [`MemoryStore`], also reached by the sweep task.
#[derive(Debug)]
pub struct StoreState {
    table: RwLock<Table>,
    counters: StatsCounters,
    /// Monotonic access sequence used as the LRU marker
    clock: AtomicU64,
    started_at: Instant,
    config: MemoryConfig,
}

impl StoreState {
    fn next_tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Evicts until `incoming` bytes for `key` fit both limits.
    fn make_room(&self, table: &mut Table, key: &str, incoming: u64, now_ms: u64) {
        let policy = self.config.eviction_policy;

        if self.config.max_memory > 0 {
            loop {
                let existing = table.entries.get(key).map_or(0, |e| e.size() as u64);
                if table.memory_usage - existing + incoming <= self.config.max_memory {
                    break;
                }
                if !table.reclaim(policy, &self.counters, now_ms) {
                    break;
                }
            }
        }

        if self.config.max_keys > 0
            && !table.entries.contains_key(key)
            && table.entries.len() >= self.config.max_keys
        {
            table.reclaim(policy, &self.counters, now_ms);
        }
    }

    /// Inserts or overwrites in place. `ttl` of `None` keeps the current
    /// expiry of an existing entry.
    fn upsert(&self, table: &mut Table, key: &str, value: Bytes, ttl: Option<Option<Duration>>) {
        let tick = self.next_tick();
        let size = value.len() as u64;

        match table.entries.get_mut(key) {
            Some(entry) => {
                let old_size = entry.size() as u64;
                entry.value = value;
                if let Some(ttl) = ttl {
                    entry.set_ttl(ttl);
                }
                entry.mark_written(tick);
                table.memory_usage = table.memory_usage - old_size + size;
            }
            None => {
                let entry = CacheEntry::new(value, ttl.unwrap_or(self.config.default_ttl), tick);
                table.entries.insert(key.to_string(), entry);
                table.memory_usage += size;
            }
        }
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.filter(|ttl| !ttl.is_zero()).or(self.config.default_ttl)
    }
}

impl ExpirySweep for StoreState {
    fn sweep_expired(&self) -> usize {
        let mut table = self.table.write();
        table.purge_expired(current_timestamp_ms())
    }
}

// == Memory Store ==
/// In-memory [`Backend`] with TTL, eviction and a background expiry sweep.
#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<StoreState>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store from `config`.
    ///
    /// When called inside a tokio runtime and the sweep interval is non-zero,
    /// a background task is started that removes expired entries on every
    /// tick. Outside a runtime expired entries are only removed lazily.
    pub fn new(config: MemoryConfig) -> Self {
        let sweep_interval = config.sweep_interval;
        let state = Arc::new(StoreState {
            table: RwLock::new(Table::default()),
            counters: StatsCounters::new(),
            clock: AtomicU64::new(0),
            started_at: Instant::now(),
            config,
        });
        let shutdown = CancellationToken::new();

        let sweeper = if sweep_interval.is_zero() {
            None
        } else if tokio::runtime::Handle::try_current().is_ok() {
            Some(spawn_sweep_task(
                Arc::downgrade(&state),
                sweep_interval,
                shutdown.clone(),
            ))
        } else {
            debug!("No tokio runtime available, expiry sweep disabled");
            None
        };

        info!(
            max_memory = state.config.max_memory,
            max_keys = state.config.max_keys,
            policy = %state.config.eviction_policy,
            "Memory store initialized"
        );

        Self {
            state,
            shutdown,
            sweeper: Mutex::new(sweeper),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.state.config
    }

    // == Length ==
    /// Returns the current number of entries, expired-but-unswept included.
    pub fn len(&self) -> usize {
        self.state.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the memory limit.
    pub fn memory_usage(&self) -> u64 {
        self.state.table.read().memory_usage
    }

    /// Keys of all live entries, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        self.state
            .table
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Purge Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.state.sweep_expired()
    }

    fn lookup(&self, key: &str) -> Result<Bytes> {
        let now = current_timestamp_ms();
        {
            let table = self.state.table.read();
            match table.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    entry.touch(self.state.next_tick());
                    self.state.counters.record_hit();
                    return Ok(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.state.counters.record_miss();
                    return Err(CacheError::NotFound(key.to_string()));
                }
            }
        }

        // Expired: upgrade to the write lock and drop it lazily
        self.state.table.write().remove_if_expired(key, now);
        self.state.counters.record_miss();
        Err(CacheError::NotFound(key.to_string()))
    }

    fn insert(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        let max_memory = self.state.config.max_memory;
        if max_memory > 0 && value.len() as u64 > max_memory {
            return Err(CacheError::InvalidRequest(format!(
                "Value of {} bytes exceeds the store limit of {} bytes",
                value.len(),
                max_memory
            )));
        }

        let ttl = self.state.effective_ttl(ttl);
        let now = current_timestamp_ms();
        let mut table = self.state.table.write();

        self.state.make_room(&mut table, key, value.len() as u64, now);
        self.state.upsert(&mut table, key, value, Some(ttl));
        self.state.counters.record_set();
        Ok(())
    }

    fn remove(&self, key: &str) {
        if self.state.table.write().remove(key).is_some() {
            self.state.counters.record_delete();
        }
    }

    // == Counter Update ==
    /// Read-modify-write of a decimal counter under the exclusive lock.
    /// `apply` returns None when the result does not fit an i64.
    fn update_counter<F>(&self, key: &str, op: &str, delta: i64, apply: F) -> Result<i64>
    where
        F: FnOnce(i64) -> Option<i64>,
    {
        let now = current_timestamp_ms();
        let mut table = self.state.table.write();

        let current = match table.live(key, now) {
            Some(entry) => Some((parse_counter(key, &entry.value)?, entry.expires_at)),
            None => None,
        };

        let base = current.map_or(0, |(value, _)| value);
        let next = apply(base).ok_or_else(|| {
            CacheError::Overflow(format!("{} {} {} on key {}", base, op, delta, key))
        })?;
        let encoded = Bytes::from(next.to_string());

        let max_memory = self.state.config.max_memory;
        if max_memory > 0 && encoded.len() as u64 > max_memory {
            return Err(CacheError::InvalidRequest(format!(
                "Counter of {} bytes exceeds the store limit of {} bytes",
                encoded.len(),
                max_memory
            )));
        }

        if current.is_none() {
            table.remove_if_expired(key, now);
        }
        self.state.make_room(&mut table, key, encoded.len() as u64, now);

        match current {
            Some(_) if table.entries.contains_key(key) => {
                self.state.upsert(&mut table, key, encoded, None);
            }
            Some((_, expires_at)) => {
                // The counter itself was chosen as the victim: re-insert it
                // with its previous deadline.
                self.state.upsert(&mut table, key, encoded, Some(None));
                if let Some(entry) = table.entries.get_mut(key) {
                    entry.expires_at = expires_at;
                }
            }
            None => {
                self.state
                    .upsert(&mut table, key, encoded, Some(self.state.config.default_ttl));
            }
        }

        Ok(next)
    }
}

fn parse_counter(key: &str, value: &[u8]) -> Result<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CacheError::NotANumber(key.to_string()))
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// == Backend Implementation ==
#[async_trait]
impl Backend for MemoryStore {
    async fn get(&self, _cancel: &CancellationToken, key: &str) -> Result<Bytes> {
        self.lookup(key)
    }

    async fn set(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.insert(key, value, ttl)
    }

    async fn delete(&self, _cancel: &CancellationToken, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn exists(&self, _cancel: &CancellationToken, key: &str) -> Result<bool> {
        let now = current_timestamp_ms();
        {
            let table = self.state.table.read();
            match table.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }

        self.state.table.write().remove_if_expired(key, now);
        Ok(false)
    }

    async fn get_multi(
        &self,
        _cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, Bytes>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.lookup(key).ok().map(|value| (key.clone(), value)))
            .collect())
    }

    async fn set_multi(
        &self,
        _cancel: &CancellationToken,
        items: HashMap<String, Bytes>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        for (key, value) in items {
            self.insert(&key, value, ttl)?;
        }
        Ok(())
    }

    async fn delete_multi(&self, _cancel: &CancellationToken, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key);
        }
        Ok(())
    }

    async fn increment(&self, _cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.update_counter(key, "+", delta, |base| base.checked_add(delta))
    }

    async fn decrement(&self, _cancel: &CancellationToken, key: &str, delta: i64) -> Result<i64> {
        self.update_counter(key, "-", delta, |base| base.checked_sub(delta))
    }

    async fn expire(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let now = current_timestamp_ms();
        let mut table = self.state.table.write();

        if table.remove_if_expired(key, now) {
            return Err(CacheError::NotFound(key.to_string()));
        }
        match table.entries.get_mut(key) {
            Some(entry) => {
                entry.set_ttl(ttl.filter(|ttl| !ttl.is_zero()));
                Ok(())
            }
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    async fn ttl(&self, _cancel: &CancellationToken, key: &str) -> Result<Option<Duration>> {
        let now = current_timestamp_ms();
        let table = self.state.table.read();
        table
            .live(key, now)
            .map(CacheEntry::ttl_remaining)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn clear(&self, _cancel: &CancellationToken) -> Result<()> {
        let mut table = self.state.table.write();
        table.entries.clear();
        table.memory_usage = 0;
        self.state.counters.reset();
        Ok(())
    }

    async fn stats(&self, _cancel: &CancellationToken) -> Result<CacheStats> {
        let (key_count, memory_usage) = {
            let mut table = self.state.table.write();
            table.purge_expired(current_timestamp_ms());
            (table.entries.len() as u64, table.memory_usage)
        };

        Ok(self.state.counters.snapshot(
            key_count,
            memory_usage,
            self.state.started_at.elapsed().as_secs(),
        ))
    }

    async fn health(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            debug!("Expiry sweep stopped");
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio_test::{assert_err, assert_ok};

    fn config(max_keys: usize, policy: EvictionPolicy) -> MemoryConfig {
        MemoryConfig {
            max_keys,
            eviction_policy: policy,
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(config(0, EvictionPolicy::Lru))
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = store();
        let cancel = CancellationToken::new();

        assert_ok!(store.set(&cancel, "key1", b("value1"), None).await);
        assert_eq!(store.get(&cancel, "key1").await.unwrap(), b("value1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent_is_miss() {
        let store = store();
        let cancel = CancellationToken::new();

        let result = store.get(&cancel, "nonexistent").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        let stats = store.stats(&cancel).await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_store_delete_is_idempotent() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "key1", b("value1"), None).await.unwrap();
        assert_ok!(store.delete(&cancel, "key1").await);
        assert_ok!(store.delete(&cancel, "key1").await);

        assert!(store.is_empty());
        assert_eq!(store.stats(&cancel).await.unwrap().deletes, 1);
    }

    #[tokio::test]
    async fn test_store_overwrite_updates_memory() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "key1", b("1234"), None).await.unwrap();
        assert_eq!(store.memory_usage(), 4);
        store.set(&cancel, "key1", b("12"), None).await.unwrap();
        assert_eq!(store.memory_usage(), 2);
        assert_eq!(store.get(&cancel, "key1").await.unwrap(), b("12"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = store();
        let cancel = CancellationToken::new();

        store
            .set(&cancel, "key1", b("value1"), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(store.get(&cancel, "key1").await.is_ok());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(matches!(
            store.get(&cancel, "key1").await,
            Err(CacheError::NotFound(_))
        ));
        assert!(store.is_empty(), "expired entry is removed on access");
        assert_eq!(store.memory_usage(), 0);
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let store = MemoryStore::new(MemoryConfig {
            default_ttl: Some(Duration::from_secs(30)),
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        store.set(&cancel, "k", b("v"), None).await.unwrap();
        let ttl = store.ttl(&cancel, "k").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(30));
        assert!(ttl > Duration::from_secs(28));
    }

    #[tokio::test]
    async fn test_lru_scenario() {
        let store = MemoryStore::new(config(2, EvictionPolicy::Lru));
        let cancel = CancellationToken::new();

        store.set(&cancel, "a", b("1"), None).await.unwrap();
        store.set(&cancel, "b", b("2"), None).await.unwrap();
        store.get(&cancel, "a").await.unwrap();
        store.set(&cancel, "c", b("3"), None).await.unwrap();

        let keys: HashSet<String> = store.keys().into_iter().collect();
        let expected: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, expected);
        assert_eq!(store.stats(&cancel).await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_lfu_evicts_least_hit() {
        let store = MemoryStore::new(config(2, EvictionPolicy::Lfu));
        let cancel = CancellationToken::new();

        store.set(&cancel, "hot", b("1"), None).await.unwrap();
        store.set(&cancel, "cold", b("2"), None).await.unwrap();
        for _ in 0..3 {
            store.get(&cancel, "hot").await.unwrap();
        }
        store.get(&cancel, "cold").await.unwrap();
        store.set(&cancel, "new", b("3"), None).await.unwrap();

        assert!(store.exists(&cancel, "hot").await.unwrap());
        assert!(!store.exists(&cancel, "cold").await.unwrap());
        assert!(store.exists(&cancel, "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_random_policy_respects_key_limit() {
        let store = MemoryStore::new(config(3, EvictionPolicy::Random));
        let cancel = CancellationToken::new();

        for i in 0..10 {
            store.set(&cancel, &format!("k{}", i), b("v"), None).await.unwrap();
            assert!(store.len() <= 3);
        }
        assert!(store.exists(&cancel, "k9").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_limit_evicts_until_fit() {
        let store = MemoryStore::new(MemoryConfig {
            max_memory: 10,
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        store.set(&cancel, "a", b("1234"), None).await.unwrap();
        store.set(&cancel, "b", b("1234"), None).await.unwrap();
        store.set(&cancel, "c", b("12345678"), None).await.unwrap();

        assert!(store.memory_usage() <= 10);
        assert_eq!(store.keys(), vec!["c".to_string()]);
        assert_eq!(store.stats(&cancel).await.unwrap().evictions, 2);
    }

    #[tokio::test]
    async fn test_oversized_value_rejected() {
        let store = MemoryStore::new(MemoryConfig {
            max_memory: 4,
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        let result = store.set(&cancel, "k", b("12345"), None).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_key_too_long() {
        let store = store();
        let cancel = CancellationToken::new();
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = store.set(&cancel, &long_key, b("v"), None).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let store = store();
        let cancel = CancellationToken::new();

        assert_eq!(store.increment(&cancel, "counter", 5).await.unwrap(), 5);
        assert_eq!(store.decrement(&cancel, "counter", 5).await.unwrap(), 0);
        assert_eq!(store.increment(&cancel, "counter", -3).await.unwrap(), -3);
        assert_eq!(store.get(&cancel, "counter").await.unwrap(), b("-3"));
        assert_eq!(store.memory_usage(), 2);
    }

    #[tokio::test]
    async fn test_increment_not_a_number() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "name", b("alice"), None).await.unwrap();
        let result = store.increment(&cancel, "name", 1).await;
        assert!(matches!(result, Err(CacheError::NotANumber(_))));
        assert_eq!(store.get(&cancel, "name").await.unwrap(), b("alice"));
    }

    #[tokio::test]
    async fn test_increment_overflow() {
        let store = store();
        let cancel = CancellationToken::new();

        store
            .set(&cancel, "n", Bytes::from(i64::MAX.to_string()), None)
            .await
            .unwrap();
        assert!(matches!(
            store.increment(&cancel, "n", 1).await,
            Err(CacheError::Overflow(_))
        ));
        assert!(matches!(
            store.decrement(&cancel, "m", i64::MIN).await,
            Err(CacheError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn test_decrement_by_min_when_result_fits() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "n", b("-1"), None).await.unwrap();
        assert_eq!(store.decrement(&cancel, "n", i64::MIN).await.unwrap(), i64::MAX);
        assert_eq!(store.get(&cancel, "n").await.unwrap(), Bytes::from(i64::MAX.to_string()));
    }

    #[tokio::test]
    async fn test_growing_counter_stays_within_memory_limit() {
        let store = MemoryStore::new(MemoryConfig {
            max_memory: 4,
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        store.set(&cancel, "a", b("xx"), None).await.unwrap();
        store.set(&cancel, "n", b("99"), None).await.unwrap();
        assert_eq!(store.increment(&cancel, "n", 1).await.unwrap(), 100);

        assert!(store.memory_usage() <= 4);
        assert_eq!(store.get(&cancel, "n").await.unwrap(), b("100"));
        assert!(!store.exists(&cancel, "a").await.unwrap());
        assert_eq!(store.stats(&cancel).await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_evicted_counter_keeps_its_deadline() {
        let store = MemoryStore::new(MemoryConfig {
            max_memory: 3,
            sweep_interval: Duration::ZERO,
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        store.set(&cancel, "a", b("x"), None).await.unwrap();
        store
            .set(&cancel, "n", b("99"), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store.get(&cancel, "a").await.unwrap();
        assert_eq!(store.increment(&cancel, "n", 1).await.unwrap(), 100);

        assert_eq!(store.memory_usage(), 3);
        assert_eq!(store.keys(), vec!["n".to_string()]);
        let ttl = store.ttl(&cancel, "n").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(58));
    }

    #[tokio::test]
    async fn test_increment_keeps_expiry() {
        let store = store();
        let cancel = CancellationToken::new();

        store
            .set(&cancel, "n", b("1"), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store.increment(&cancel, "n", 1).await.unwrap();
        assert!(store.ttl(&cancel, "n").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increments_are_atomic_under_contention() {
        let store = Arc::new(store());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                for _ in 0..100 {
                    store.increment(&cancel, "hits", 1).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let cancel = CancellationToken::new();
        assert_eq!(store.increment(&cancel, "hits", 0).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "k", b("v"), None).await.unwrap();
        assert_eq!(store.ttl(&cancel, "k").await.unwrap(), None);

        store
            .expire(&cancel, "k", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(store.ttl(&cancel, "k").await.unwrap().is_some());

        store.expire(&cancel, "k", None).await.unwrap();
        assert_eq!(store.ttl(&cancel, "k").await.unwrap(), None);

        assert_err!(store.expire(&cancel, "missing", None).await);
        assert!(matches!(
            store.ttl(&cancel, "missing").await,
            Err(CacheError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_multi_operations() {
        let store = store();
        let cancel = CancellationToken::new();

        let items: HashMap<String, Bytes> = [("a", "1"), ("b", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), b(v)))
            .collect();
        store.set_multi(&cancel, items, None).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = store.get_multi(&cancel, &keys).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], b("1"));

        store.delete_multi(&cancel, &keys).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let store = store();
        let cancel = CancellationToken::new();

        store.set(&cancel, "a", b("1"), None).await.unwrap();
        store.get(&cancel, "a").await.unwrap();
        store.clear(&cancel).await.unwrap();

        let stats = store.stats(&cancel).await.unwrap();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.key_count, 0);
        assert_eq!(stats.memory_usage, 0);
    }

    #[tokio::test]
    async fn test_stats_exclude_expired_entries_without_access() {
        let store = store();
        let cancel = CancellationToken::new();

        store
            .set(&cancel, "k", b("0123456789"), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        store.set(&cancel, "kept", b("v"), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = store.stats(&cancel).await.unwrap();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.memory_usage, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_background_sweep_removes_expired() {
        let store = MemoryStore::new(MemoryConfig {
            sweep_interval: Duration::from_millis(20),
            ..MemoryConfig::default()
        });
        let cancel = CancellationToken::new();

        store
            .set(&cancel, "short", b("v"), Some(Duration::from_millis(30)))
            .await
            .unwrap();
        store.set(&cancel, "long", b("v"), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.len(), 1, "sweep removes without any access");
        assert_eq!(store.memory_usage(), 1);
        assert_ok!(store.close().await);
        assert_ok!(store.close().await);
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let store = store();
        assert_ok!(store.health(&CancellationToken::new()).await);
    }
}
