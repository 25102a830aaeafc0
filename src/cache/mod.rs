//! Cache Module
//!
//! In-memory key-value store with TTL expiration, selectable eviction and
//! lock-free statistics.

mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use eviction::EvictionPolicy;
pub use stats::{CacheStats, StatsCounters};
pub use store::MemoryStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
