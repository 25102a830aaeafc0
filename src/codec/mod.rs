//! Codec Module
//!
//! Serialization of typed values into cache payloads and optional
//! compression of those payloads on their way to a backend.

mod compressor;
mod serializer;

pub use compressor::CompressorKind;
pub use serializer::SerializerKind;
