//! Checkpoint record
//!
//! The recovery anchor: the last segment in use and the byte offset up to
//! which it holds only complete, valid frames.

use crate::codec::varint;
use crate::error::{BlockLogError, Result};

/// Durable recovery anchor, one per store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Sequence number of the segment being appended to
    pub last_segment_seq: u64,
    /// Bytes `[0, last_good_offset)` of that segment are complete frames
    pub last_good_offset: u64,
}

impl Checkpoint {
    pub fn new(last_segment_seq: u64, last_good_offset: u64) -> Self {
        Self {
            last_segment_seq,
            last_good_offset,
        }
    }

    /// Encode as two consecutive varints: segment seq, then offset
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 * varint::MAX_VARINT_LEN);
        varint::encode_u64(&mut buf, self.last_segment_seq);
        varint::encode_u64(&mut buf, self.last_good_offset);
        buf
    }

    /// Decode the form written by `marshal`
    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        let (last_segment_seq, n) = varint::decode_u64(bytes).ok_or_else(|| {
            BlockLogError::CorruptCheckpoint("cannot decode last segment seq".to_string())
        })?;

        let (last_good_offset, _) = varint::decode_u64(&bytes[n..]).ok_or_else(|| {
            BlockLogError::CorruptCheckpoint("cannot decode last good offset".to_string())
        })?;

        Ok(Self {
            last_segment_seq,
            last_good_offset,
        })
    }
}
