//! Configuration Module
//!
//! Typed cache configuration, loaded from environment variables and
//! validated once before any cache is built.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::codec::{CompressorKind, SerializerKind};
use crate::error::{CacheError, Result};

/// Default memory budget of a store (100 MB)
pub const DEFAULT_MAX_MEMORY: u64 = 100 * 1024 * 1024;

/// Default virtual nodes per shard on the consistent-hash ring
pub const DEFAULT_REPLICAS: usize = 100;

/// Default shard count in sharded mode
pub const DEFAULT_SHARDS: usize = 3;

/// TTL given to values promoted from L2 into L1 when none is configured
pub const DEFAULT_PROMOTION_TTL: Duration = Duration::from_secs(5 * 60);

// == Cache Mode ==
/// Operating mode chosen once when the cache is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// One backend handles every key
    #[default]
    Single,
    /// Keys are partitioned across several backends
    Sharded,
    /// Two caches composed as L1/L2
    Hierarchical,
}

impl FromStr for CacheMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(CacheMode::Single),
            "sharded" | "distributed" => Ok(CacheMode::Sharded),
            "hierarchical" => Ok(CacheMode::Hierarchical),
            other => Err(CacheError::InvalidConfiguration(format!(
                "invalid mode: {}, must be one of single, sharded, hierarchical",
                other
            ))),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Single => f.write_str("single"),
            CacheMode::Sharded => f.write_str("sharded"),
            CacheMode::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

// == Sharding Algorithm ==
/// Key routing strategy for sharded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardingAlgorithm {
    /// `crc32(key) mod shards`
    Hash,
    /// First shard whose boundary byte is >= the key's first byte
    Range,
    /// Hash ring with virtual nodes
    #[default]
    Consistent,
}

impl FromStr for ShardingAlgorithm {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(ShardingAlgorithm::Hash),
            "range" => Ok(ShardingAlgorithm::Range),
            "consistent" => Ok(ShardingAlgorithm::Consistent),
            other => Err(CacheError::InvalidConfiguration(format!(
                "invalid sharding algorithm: {}, must be one of hash, range, consistent",
                other
            ))),
        }
    }
}

// == Memory Config ==
/// Parameters of one in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Byte budget for stored values, 0 = unlimited
    pub max_memory: u64,
    /// Maximum number of keys, 0 = unlimited
    pub max_keys: usize,
    /// Victim selection when a limit is hit
    pub eviction_policy: EvictionPolicy,
    /// TTL for writes that do not pass one, None = never expire
    pub default_ttl: Option<Duration>,
    /// Time between expiry sweeps, zero disables the sweep
    pub sweep_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            max_keys: 0,
            eviction_policy: EvictionPolicy::Lru,
            default_ttl: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl MemoryConfig {
    fn validate(&self, scope: &str) -> Result<()> {
        if self.default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfiguration(format!(
                "{}: default TTL must be positive, leave it unset to disable expiry",
                scope
            )));
        }
        Ok(())
    }
}

// == Backend Config ==
/// Descriptor of the backend built for a store slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Memory(MemoryConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory(MemoryConfig::default())
    }
}

impl BackendConfig {
    fn validate(&self, scope: &str) -> Result<()> {
        match self {
            BackendConfig::Memory(memory) => memory.validate(scope),
        }
    }
}

// == Sharding Config ==
#[derive(Debug, Clone, PartialEq)]
pub struct ShardingConfig {
    pub algorithm: ShardingAlgorithm,
    /// Number of backends created at startup
    pub shards: usize,
    /// Virtual nodes per shard (consistent hashing only)
    pub replicas: usize,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            algorithm: ShardingAlgorithm::Consistent,
            shards: DEFAULT_SHARDS,
            replicas: DEFAULT_REPLICAS,
        }
    }
}

// == Config ==
/// Complete cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mode: CacheMode,
    /// Backend for single mode, and the template for every shard
    pub backend: BackendConfig,
    pub sharding: ShardingConfig,
    /// L1 backend in hierarchical mode
    pub l1: BackendConfig,
    /// L2 backend in hierarchical mode
    pub l2: BackendConfig,
    /// TTL of values promoted from L2 into L1
    pub promotion_ttl: Option<Duration>,
    pub serializer: SerializerKind,
    pub compressor: CompressorKind,
    /// HTTP server port for the bundled binary
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: CacheMode::Single,
            backend: BackendConfig::default(),
            sharding: ShardingConfig::default(),
            l1: BackendConfig::Memory(MemoryConfig {
                max_memory: 10 * 1024 * 1024,
                ..MemoryConfig::default()
            }),
            l2: BackendConfig::default(),
            promotion_ttl: None,
            serializer: SerializerKind::Json,
            compressor: CompressorKind::None,
            server_port: 3000,
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHEX_MODE` - single, sharded or hierarchical (default: single)
    /// - `CACHEX_MAX_MEMORY` - store byte budget, e.g. `100MB` (default: 100MB)
    /// - `CACHEX_MAX_KEYS` - key limit, 0 = unlimited (default: 0)
    /// - `CACHEX_EVICTION_POLICY` - lru, lfu or random (default: lru)
    /// - `CACHEX_DEFAULT_TTL` - default TTL in seconds (default: none)
    /// - `CACHEX_SWEEP_INTERVAL` - expiry sweep period in seconds (default: 60)
    /// - `CACHEX_SHARDING_ALGORITHM` - hash, range or consistent (default: consistent)
    /// - `CACHEX_SHARDS` - shard count (default: 3)
    /// - `CACHEX_REPLICAS` - virtual nodes per shard (default: 100)
    /// - `CACHEX_L1_MAX_MEMORY`, `CACHEX_L1_MAX_KEYS` - L1 limits (default: 10MB, 0)
    /// - `CACHEX_L2_MAX_MEMORY`, `CACHEX_L2_MAX_KEYS` - L2 limits (default: 100MB, 0)
    /// - `CACHEX_PROMOTION_TTL` - promotion TTL in seconds (default: 300)
    /// - `CACHEX_SERIALIZER` - json or bincode (default: json)
    /// - `CACHEX_COMPRESSION` - none, gzip or lz4 (default: none)
    /// - `CACHEX_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparsable values are reported instead of silently replaced.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut base = MemoryConfig::default();
        if let Some(v) = get("CACHEX_MAX_MEMORY") {
            base.max_memory = parse_size(&v)?;
        }
        if let Some(v) = get("CACHEX_MAX_KEYS") {
            base.max_keys = parse_number("CACHEX_MAX_KEYS", &v)?;
        }
        if let Some(v) = get("CACHEX_EVICTION_POLICY") {
            base.eviction_policy = v.parse()?;
        }
        if let Some(v) = get("CACHEX_DEFAULT_TTL") {
            base.default_ttl = Some(Duration::from_secs(parse_number("CACHEX_DEFAULT_TTL", &v)?));
        }
        if let Some(v) = get("CACHEX_SWEEP_INTERVAL") {
            base.sweep_interval = Duration::from_secs(parse_number("CACHEX_SWEEP_INTERVAL", &v)?);
        }

        let tier = |prefix: &str, default_memory: u64| -> Result<BackendConfig> {
            let mut memory = MemoryConfig {
                max_memory: default_memory,
                ..base.clone()
            };
            if let Some(v) = get(&format!("{}_MAX_MEMORY", prefix)) {
                memory.max_memory = parse_size(&v)?;
            }
            let keys_var = format!("{}_MAX_KEYS", prefix);
            if let Some(v) = get(&keys_var) {
                memory.max_keys = parse_number(&keys_var, &v)?;
            }
            Ok(BackendConfig::Memory(memory))
        };

        let mut sharding = ShardingConfig::default();
        if let Some(v) = get("CACHEX_SHARDING_ALGORITHM") {
            sharding.algorithm = v.parse()?;
        }
        if let Some(v) = get("CACHEX_SHARDS") {
            sharding.shards = parse_number("CACHEX_SHARDS", &v)?;
        }
        if let Some(v) = get("CACHEX_REPLICAS") {
            sharding.replicas = parse_number("CACHEX_REPLICAS", &v)?;
        }

        let config = Config {
            mode: get("CACHEX_MODE")
                .map(|v| v.parse::<CacheMode>())
                .transpose()?
                .unwrap_or_default(),
            l1: tier("CACHEX_L1", 10 * 1024 * 1024)?,
            l2: tier("CACHEX_L2", DEFAULT_MAX_MEMORY)?,
            backend: BackendConfig::Memory(base),
            sharding,
            promotion_ttl: get("CACHEX_PROMOTION_TTL")
                .map(|v| parse_number("CACHEX_PROMOTION_TTL", &v).map(Duration::from_secs))
                .transpose()?,
            serializer: get("CACHEX_SERIALIZER")
                .map(|v| v.parse::<SerializerKind>())
                .transpose()?
                .unwrap_or(defaults.serializer),
            compressor: get("CACHEX_COMPRESSION")
                .map(|v| v.parse::<CompressorKind>())
                .transpose()?
                .unwrap_or(defaults.compressor),
            server_port: get("CACHEX_PORT")
                .map(|v| parse_number("CACHEX_PORT", &v))
                .transpose()?
                .unwrap_or(defaults.server_port),
        };

        config.validate()?;
        Ok(config)
    }

    // == Validate ==
    /// Checks the configuration for the selected mode.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            CacheMode::Single => self.backend.validate("backend"),
            CacheMode::Sharded => {
                self.backend.validate("backend")?;
                if self.sharding.shards == 0 {
                    return Err(CacheError::InvalidConfiguration(
                        "sharded mode requires at least one shard".to_string(),
                    ));
                }
                if self.sharding.algorithm == ShardingAlgorithm::Consistent
                    && self.sharding.replicas == 0
                {
                    return Err(CacheError::InvalidConfiguration(
                        "consistent hashing requires at least one replica per shard".to_string(),
                    ));
                }
                Ok(())
            }
            CacheMode::Hierarchical => {
                self.l1.validate("l1")?;
                self.l2.validate("l2")?;
                if self.promotion_ttl.is_some_and(|ttl| ttl.is_zero()) {
                    return Err(CacheError::InvalidConfiguration(
                        "promotion TTL must be positive".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Config of a single-mode cache over `backend`, sharing this config's
    /// codec settings. Used to build hierarchical tiers.
    pub fn single(&self, backend: BackendConfig) -> Config {
        Config {
            mode: CacheMode::Single,
            backend,
            ..self.clone()
        }
    }
}

// == Parsing Helpers ==
fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CacheError::InvalidConfiguration(format!("{} is not a valid number: {}", name, value))
    })
}

/// Parses a human size such as `512`, `64KB`, `100MB` or `1GB` into bytes.
pub fn parse_size(value: &str) -> Result<u64> {
    let trimmed = value.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = trimmed.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = trimmed.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = trimmed.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = trimmed.strip_suffix('B') {
        (n, 1)
    } else {
        (trimmed.as_str(), 1)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| CacheError::InvalidConfiguration(format!("invalid size: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mode, CacheMode::Single);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sharding.replicas, DEFAULT_REPLICAS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CACHEX_MODE", "sharded"),
            ("CACHEX_MAX_MEMORY", "64KB"),
            ("CACHEX_MAX_KEYS", "500"),
            ("CACHEX_EVICTION_POLICY", "lfu"),
            ("CACHEX_DEFAULT_TTL", "30"),
            ("CACHEX_SHARDING_ALGORITHM", "hash"),
            ("CACHEX_SHARDS", "4"),
            ("CACHEX_COMPRESSION", "lz4"),
            ("CACHEX_PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.mode, CacheMode::Sharded);
        assert_eq!(config.sharding.algorithm, ShardingAlgorithm::Hash);
        assert_eq!(config.sharding.shards, 4);
        assert_eq!(config.compressor, CompressorKind::Lz4);
        assert_eq!(config.server_port, 8080);

        let BackendConfig::Memory(memory) = &config.backend;
        assert_eq!(memory.max_memory, 64 * 1024);
        assert_eq!(memory.max_keys, 500);
        assert_eq!(memory.eviction_policy, EvictionPolicy::Lfu);
        assert_eq!(memory.default_ttl, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_tier_overrides_inherit_base() {
        let config = Config::from_lookup(lookup(&[
            ("CACHEX_MODE", "hierarchical"),
            ("CACHEX_EVICTION_POLICY", "random"),
            ("CACHEX_L1_MAX_KEYS", "10"),
        ]))
        .unwrap();

        let BackendConfig::Memory(l1) = &config.l1;
        let BackendConfig::Memory(l2) = &config.l2;
        assert_eq!(l1.max_keys, 10);
        assert_eq!(l1.eviction_policy, EvictionPolicy::Random);
        assert_eq!(l2.max_keys, 0);
        assert_eq!(l2.max_memory, DEFAULT_MAX_MEMORY);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        for (name, value) in [
            ("CACHEX_MODE", "cluster"),
            ("CACHEX_MAX_KEYS", "many"),
            ("CACHEX_MAX_MEMORY", "lots"),
            ("CACHEX_SERIALIZER", "xml"),
            ("CACHEX_EVICTION_POLICY", "fifo"),
        ] {
            let result = Config::from_lookup(lookup(&[(name, value)]));
            assert!(
                matches!(result, Err(CacheError::InvalidConfiguration(_))),
                "{}={} should be rejected",
                name,
                value
            );
        }
    }

    #[test]
    fn test_validate_sharded() {
        let mut config = Config {
            mode: CacheMode::Sharded,
            ..Config::default()
        };
        config.sharding.shards = 0;
        assert!(config.validate().is_err());

        config.sharding.shards = 2;
        config.sharding.replicas = 0;
        assert!(config.validate().is_err());

        config.sharding.algorithm = ShardingAlgorithm::Hash;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_ttls() {
        let config = Config {
            mode: CacheMode::Hierarchical,
            promotion_ttl: Some(Duration::ZERO),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            backend: BackendConfig::Memory(MemoryConfig {
                default_ttl: Some(Duration::ZERO),
                ..MemoryConfig::default()
            }),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("16B").unwrap(), 16);
        assert_eq!(parse_size("64KB").unwrap(), 64 * 1024);
        assert_eq!(parse_size("100mb").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("MB").is_err());
        assert!(parse_size("ten").is_err());
    }
}
