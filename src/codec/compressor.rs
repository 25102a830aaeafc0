//! Payload compressors applied between the cache façade and its backends.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressorKind {
    /// Payloads are stored as given
    #[default]
    None,
    Gzip,
    /// LZ4 block format with the uncompressed size prepended
    Lz4,
}

impl CompressorKind {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CompressorKind::None)
    }

    pub fn compress(&self, data: Bytes) -> Result<Bytes> {
        match self {
            CompressorKind::None => Ok(data),
            CompressorKind::Gzip => {
                let mut encoder =
                    GzEncoder::new(Vec::with_capacity(data.len()), Compression::default());
                encoder
                    .write_all(&data)
                    .map_err(|e| CacheError::Compression(e.to_string()))?;
                encoder
                    .finish()
                    .map(Bytes::from)
                    .map_err(|e| CacheError::Compression(e.to_string()))
            }
            CompressorKind::Lz4 => Ok(Bytes::from(lz4_flex::compress_prepend_size(&data))),
        }
    }

    pub fn decompress(&self, data: Bytes) -> Result<Bytes> {
        match self {
            CompressorKind::None => Ok(data),
            CompressorKind::Gzip => {
                let mut decoder = GzDecoder::new(data.as_ref());
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| CacheError::Compression(e.to_string()))?;
                Ok(Bytes::from(out))
            }
            CompressorKind::Lz4 => lz4_flex::decompress_size_prepended(&data)
                .map(Bytes::from)
                .map_err(|e| CacheError::Compression(e.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressorKind::None => "none",
            CompressorKind::Gzip => "gzip",
            CompressorKind::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for CompressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressorKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(CompressorKind::None),
            "gzip" => Ok(CompressorKind::Gzip),
            "lz4" => Ok(CompressorKind::Lz4),
            other => Err(CacheError::InvalidConfiguration(format!(
                "invalid compression: {}, must be one of none, gzip, lz4",
                other
            ))),
        }
    }
}
