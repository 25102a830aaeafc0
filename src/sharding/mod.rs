//! Sharding Module
//!
//! Deterministic key routing across a set of backends.

mod ring;
mod router;

pub use ring::HashRing;
pub use router::ShardRouter;

/// CRC32 (IEEE) hash shared by the hash and consistent-hash strategies.
pub(crate) fn key_hash(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}
