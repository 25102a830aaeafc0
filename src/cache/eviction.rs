//! Eviction Policy Module
//!
//! Picks the entry to remove when a store runs out of room.
//!
//! Every policy is a full scan over the live key set, so selecting a victim
//! costs O(n) in the number of entries.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::cache::CacheEntry;
use crate::error::CacheError;

// == Eviction Policy ==
/// Strategy used to choose a victim entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Oldest access marker goes first
    #[default]
    Lru,
    /// Lowest hit count goes first, oldest access breaks ties
    Lfu,
    /// Any live entry
    Random,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Returns the key that should be evicted next, or None if `entries` is
    /// empty.
    pub fn select_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        match self {
            EvictionPolicy::Lru => entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access())
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Lfu => entries
                .iter()
                .min_by_key(|(_, entry)| (entry.access_count(), entry.last_access()))
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Random => {
                if entries.is_empty() {
                    return None;
                }
                let index = rand::rng().random_range(0..entries.len());
                entries.keys().nth(index).cloned()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Random => "random",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "random" => Ok(EvictionPolicy::Random),
            other => Err(CacheError::InvalidConfiguration(format!(
                "invalid eviction policy: {}, must be one of lru, lfu, random",
                other
            ))),
        }
    }
}
