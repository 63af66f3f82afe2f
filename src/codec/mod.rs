//! Codec Module
//!
//! Byte-level encodings shared by the segment and index layers.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────┬──────────────────────────────────────┐
//! │ Len (varint)     │ Chunk                                │
//! │                  │ ┌───────────┬──────────────────────┐ │
//! │                  │ │ CRC32 (4) │ bincode {id, payload}│ │
//! │                  │ └───────────┴──────────────────────┘ │
//! └──────────────────┴──────────────────────────────────────┘
//! ```

mod chunk;
pub mod varint;

pub use chunk::{decode_chunk, encode_chunk, Chunk, CHECKSUM_SIZE};
