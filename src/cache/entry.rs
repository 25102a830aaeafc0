//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support and
//! the access bookkeeping used by the eviction policies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// `last_access` and `access_count` are atomics so a hit can be recorded
/// while the store is only read-locked.
#[derive(Debug)]
pub struct CacheEntry {
    /// The stored payload
    pub value: Bytes,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Store-wide access sequence number of the latest touch
    last_access: AtomicU64,
    /// Number of hits served by this entry
    access_count: AtomicU64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `ttl` - Optional time to live
    /// * `tick` - Access sequence number recorded as the first access
    pub fn new(value: Bytes, ttl: Option<Duration>, tick: u64) -> Self {
        let now = current_timestamp_ms();

        Self {
            value,
            created_at: now,
            expires_at: expiry_from(now, ttl),
            last_access: AtomicU64::new(tick),
            access_count: AtomicU64::new(0),
        }
    }

    /// Size charged against the store's memory budget.
    pub fn size(&self) -> usize {
        self.value.len()
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`is_expired`](Self::is_expired) against a caller-supplied clock.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Access Tracking ==
    /// Records a hit: refreshes the access marker and bumps the counter.
    pub fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Refreshes the access marker without counting a hit.
    pub fn mark_written(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    // == Expiration Updates ==
    /// Replaces the expiration with `ttl` measured from now.
    pub fn set_ttl(&mut self, ttl: Option<Duration>) {
        self.expires_at = expiry_from(current_timestamp_ms(), ttl);
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// An elapsed TTL is reported as `Some(Duration::ZERO)`.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            Duration::from_millis(expires.saturating_sub(now))
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn expiry_from(now_ms: u64, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| now_ms.saturating_add(ttl.as_millis().min(u64::MAX as u128) as u64))
}
