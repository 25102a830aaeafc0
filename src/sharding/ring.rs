//! Consistent-hash ring with virtual nodes.

use super::key_hash;

/// Sorted ring of `(position, shard index)` pairs.
///
/// Each shard owns `replicas` positions derived from the label
/// `shard-{id}-{replica}`, where `id` is a sequence number handed out when
/// the shard joins. Ids are never reused, so adding a shard and removing it
/// again leaves every other position exactly where it was.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    nodes: Vec<(u32, usize)>,
    /// Join id of each shard, indexed by shard index
    ids: Vec<u64>,
    next_id: u64,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas,
            nodes: Vec::new(),
            ids: Vec::new(),
            next_id: 0,
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Number of virtual positions currently on the ring.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Places a new shard at the end of the shard order and returns its index.
    pub fn add_shard(&mut self) -> usize {
        let index = self.ids.len();
        let id = self.next_id;
        self.next_id += 1;
        self.ids.push(id);

        for replica in 0..self.replicas {
            let label = format!("shard-{}-{}", id, replica);
            self.nodes.push((key_hash(label.as_bytes()), index));
        }
        self.nodes.sort_unstable();
        index
    }

    /// Drops every position of shard `index` and shifts higher indices down
    /// by one so they keep pointing at the same backend.
    ///
    /// Callers check `index` against the shard count first.
    pub fn remove_shard(&mut self, index: usize) {
        if index >= self.ids.len() {
            return;
        }
        self.ids.remove(index);
        self.nodes.retain(|&(_, shard)| shard != index);
        for node in &mut self.nodes {
            if node.1 > index {
                node.1 -= 1;
            }
        }
    }

    /// Shard index owning `key`, or None when the ring is empty.
    pub fn locate(&self, key: &str) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let hash = key_hash(key.as_bytes());
        let slot = self.nodes.partition_point(|&(position, _)| position < hash);
        let (_, shard) = self.nodes.get(slot).unwrap_or(&self.nodes[0]);
        Some(*shard)
    }
}
