//! cachex - A pluggable cache engine
//!
//! One [`Cache`] façade over three operating modes: a single in-memory
//! store, keys sharded across several backends, or a two-tier L1/L2
//! hierarchy. Every storage component implements the async [`Backend`]
//! contract, so network adapters and test doubles slot in anywhere.

pub mod api;
pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod models;
pub mod sharding;
pub mod tasks;
pub mod tier;

pub use api::AppState;
pub use backend::Backend;
pub use cache::{CacheStats, EvictionPolicy, MemoryStore};
pub use codec::{CompressorKind, SerializerKind};
pub use config::{BackendConfig, CacheMode, Config, MemoryConfig, ShardingAlgorithm};
pub use error::{CacheError, Result};
pub use facade::Cache;
pub use sharding::ShardRouter;
pub use tier::TierController;
