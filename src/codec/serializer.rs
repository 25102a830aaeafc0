//! Value serializers used by the typed cache helpers.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

/// Wire format for typed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializerKind {
    #[default]
    Json,
    /// Compact binary encoding (bincode standard config)
    Bincode,
}

impl SerializerKind {
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes> {
        let encoded = match self {
            SerializerKind::Json => serde_json::to_vec(value)
                .map_err(|e| CacheError::Serialization(e.to_string()))?,
            SerializerKind::Bincode => {
                bincode::serde::encode_to_vec(value, bincode::config::standard())
                    .map_err(|e| CacheError::Serialization(e.to_string()))?
            }
        };
        Ok(Bytes::from(encoded))
    }

    pub fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            SerializerKind::Json => {
                serde_json::from_slice(data).map_err(|e| CacheError::Serialization(e.to_string()))
            }
            SerializerKind::Bincode => {
                bincode::serde::decode_from_slice(data, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Json => "json",
            SerializerKind::Bincode => "bincode",
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializerKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SerializerKind::Json),
            "bincode" | "binary" => Ok(SerializerKind::Bincode),
            other => Err(CacheError::InvalidConfiguration(format!(
                "invalid serializer: {}, must be one of json, bincode",
                other
            ))),
        }
    }
}
