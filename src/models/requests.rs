//! Request DTOs for the cache server API

use std::time::Duration;

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for PUT /set
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    /// TTL in seconds, the store default applies when absent
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Only store the value if the key does not exist yet
    #[serde(default)]
    pub nx: bool,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_secs)
    }
}

/// Optional body for POST /incr/:key and POST /decr/:key
#[derive(Debug, Clone, Deserialize)]
pub struct CounterRequest {
    #[serde(default = "default_delta")]
    pub delta: i64,
}

impl Default for CounterRequest {
    fn default() -> Self {
        Self {
            delta: default_delta(),
        }
    }
}

fn default_delta() -> i64 {
    1
}

/// Checks a key taken from a request body or path.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}
