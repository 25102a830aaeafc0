//! Shard Router
//!
//! Owns the ordered shard set and resolves keys to shards with one of three
//! strategies. Topology changes take `&mut self`; share a router across tasks
//! behind a lock that serializes them against lookups.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{key_hash, HashRing};
use crate::backend::Backend;
use crate::config::ShardingAlgorithm;
use crate::error::{CacheError, Result};

/// First range boundary; shard `i` gets `b'a' + i` when it joins.
const RANGE_BASE: u8 = b'a';

pub struct ShardRouter {
    algorithm: ShardingAlgorithm,
    shards: Vec<Arc<dyn Backend>>,
    /// Range boundary of each shard, fixed at add time
    boundaries: Vec<u8>,
    ring: HashRing,
}

impl fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardRouter")
            .field("algorithm", &self.algorithm)
            .field("shards", &self.shards.len())
            .field("ring_positions", &self.ring.len())
            .finish()
    }
}

impl ShardRouter {
    // == Constructors ==
    /// Creates an empty router. `replicas` only matters for consistent hashing.
    pub fn new(algorithm: ShardingAlgorithm, replicas: usize) -> Self {
        Self {
            algorithm,
            shards: Vec::new(),
            boundaries: Vec::new(),
            ring: HashRing::new(replicas),
        }
    }

    pub fn with_shards(
        algorithm: ShardingAlgorithm,
        replicas: usize,
        shards: Vec<Arc<dyn Backend>>,
    ) -> Self {
        let mut router = Self::new(algorithm, replicas);
        for shard in shards {
            router.add_shard(shard);
        }
        router
    }

    pub fn algorithm(&self) -> ShardingAlgorithm {
        self.algorithm
    }

    // == Lookup ==
    /// Backend owning `key`, or None when there are no shards.
    pub fn get_shard(&self, key: &str) -> Option<&Arc<dyn Backend>> {
        self.get_shard_index(key).and_then(|index| self.shards.get(index))
    }

    /// Index of the shard owning `key`, or None when there are no shards.
    pub fn get_shard_index(&self, key: &str) -> Option<usize> {
        if self.shards.is_empty() {
            return None;
        }
        match self.algorithm {
            ShardingAlgorithm::Hash => {
                Some(key_hash(key.as_bytes()) as usize % self.shards.len())
            }
            ShardingAlgorithm::Range => Some(self.range_index(key)),
            ShardingAlgorithm::Consistent => self.ring.locate(key),
        }
    }

    fn range_index(&self, key: &str) -> usize {
        let Some(&first) = key.as_bytes().first() else {
            return 0;
        };
        self.boundaries
            .iter()
            .position(|&boundary| boundary >= first)
            .unwrap_or(self.shards.len() - 1)
    }

    // == Topology ==
    /// Appends a shard and returns its index.
    pub fn add_shard(&mut self, backend: Arc<dyn Backend>) -> usize {
        let index = self.shards.len();
        let boundary = u8::try_from(index)
            .map(|offset| RANGE_BASE.saturating_add(offset))
            .unwrap_or(u8::MAX);

        self.shards.push(backend);
        self.boundaries.push(boundary);
        let ring_index = self.ring.add_shard();
        debug_assert_eq!(ring_index, index);

        info!(
            "Shard {} added ({:?} algorithm, {} shards)",
            index,
            self.algorithm,
            self.shards.len()
        );
        index
    }

    /// Removes shard `index`; every higher shard moves down one slot.
    pub fn remove_shard(&mut self, index: usize) -> Result<Arc<dyn Backend>> {
        if index >= self.shards.len() {
            return Err(self.out_of_range(index));
        }
        let removed = self.shards.remove(index);
        self.boundaries.remove(index);
        self.ring.remove_shard(index);

        info!("Shard {} removed ({} shards left)", index, self.shards.len());
        Ok(removed)
    }

    // == Access ==
    pub fn shard(&self, index: usize) -> Result<&Arc<dyn Backend>> {
        self.shards.get(index).ok_or_else(|| self.out_of_range(index))
    }

    pub fn shards(&self) -> &[Arc<dyn Backend>] {
        &self.shards
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn out_of_range(&self, index: usize) -> CacheError {
        CacheError::ShardUnavailable(format!(
            "shard index {} out of range ({} shards)",
            index,
            self.shards.len()
        ))
    }
}
