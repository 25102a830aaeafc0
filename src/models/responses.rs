//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    /// Stored bytes as text; invalid UTF-8 is replaced
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

/// Response body for PUT /set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
    /// False when a conditional write found the key already present
    pub stored: bool,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            stored: true,
        }
    }

    pub fn skipped(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' already exists", key),
            key,
            stored: false,
        }
    }
}

/// Response body for DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /incr/:key and POST /decr/:key
#[derive(Debug, Clone, Serialize)]
pub struct CounterResponse {
    pub key: String,
    pub value: i64,
}

impl CounterResponse {
    pub fn new(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for DELETE /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Operating mode of the cache
    pub mode: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(mode: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            mode: mode.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_response_lossy_value() {
        let resp = GetResponse::new("k", &[b'o', b'k', 0xff]);
        assert!(resp.value.starts_with("ok"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"key\":\"k\""));
    }

    #[test]
    fn test_set_response_variants() {
        assert!(SetResponse::new("a").stored);
        let skipped = SetResponse::skipped("a");
        assert!(!skipped.stored);
        assert!(skipped.message.contains("already exists"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("deleted_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("deleted_key"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_stats_response_flattens_counters() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            key_count: 7,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new("single", stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);

        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["mode"], "single");
        assert_eq!(json["hits"], 80);
        assert_eq!(json["key_count"], 7);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new("sharded", CacheStats::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_counter_response_serialize() {
        let json = serde_json::to_string(&CounterResponse::new("hits", -3)).unwrap();
        assert_eq!(json, r#"{"key":"hits","value":-3}"#);
    }
}
