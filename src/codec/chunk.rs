//! Chunk encoding
//!
//! A chunk is one logical record: a block id plus the caller's payload.
//! Encoded form: `[crc32 (4, LE)][bincode(Chunk)]`. The checksum covers the
//! bincode body, so garbage bytes fail to decode instead of yielding a chunk.

use serde::{Deserialize, Serialize};

use crate::error::{BlockLogError, Result};

/// Size of the checksum that precedes the body
pub const CHECKSUM_SIZE: usize = 4;

/// A single logical record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Block identifier the chunk was written under
    pub id: String,

    /// Opaque caller payload
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// Serialize to the on-disk chunk form
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_chunk(self)
    }

    /// Deserialize from the on-disk chunk form
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_chunk(bytes)
    }
}

/// Encode a chunk
pub fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>> {
    let body =
        bincode::serialize(chunk).map_err(|e| BlockLogError::ChunkEncodeFailed(e.to_string()))?;

    let crc = crc32fast::hash(&body);

    let mut encoded = Vec::with_capacity(CHECKSUM_SIZE + body.len());
    encoded.extend_from_slice(&crc.to_le_bytes());
    encoded.extend_from_slice(&body);
    Ok(encoded)
}

/// Decode a chunk, failing with `CorruptChunk` on any malformed input
pub fn decode_chunk(bytes: &[u8]) -> Result<Chunk> {
    if bytes.len() < CHECKSUM_SIZE {
        return Err(BlockLogError::CorruptChunk(format!(
            "chunk too short: {} bytes",
            bytes.len()
        )));
    }

    let (crc_bytes, body) = bytes.split_at(CHECKSUM_SIZE);
    let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed_crc = crc32fast::hash(body);

    if stored_crc != computed_crc {
        return Err(BlockLogError::CorruptChunk(format!(
            "checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, computed_crc
        )));
    }

    bincode::deserialize(body).map_err(|e| BlockLogError::CorruptChunk(e.to_string()))
}
