//! Segment Module
//!
//! Append-only log segments holding length-prefixed chunk frames.
//!
//! ## Responsibilities
//! - Name and discover segment files (`segment_NNNNNN`)
//! - Append frames to the open tail segment, truncate torn tails
//! - Scan frames sequentially, stopping at a clean or torn end
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (varint) │ Chunk (Len bytes)    │ │
//! │ └──────────────┴──────────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2                                 │
//! │ ┌──────────────┬──────────────────────┐ │
//! │ │ Len (varint) │ Chunk (Len bytes)    │ │
//! │ └──────────────┴──────────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A frame is valid only when its prefix decodes and exactly `Len` bytes
//! follow it. Anything else at the tail is a torn write.

mod file;
mod scanner;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

pub use file::{FsSegmentOpener, SegmentFile, SegmentFileOpener};
pub use scanner::{FrameIter, FramePlacement, ScanResult, SegmentScanner};
pub use writer::SegmentWriter;

use crate::codec::varint;
use crate::error::{BlockLogError, Result};

/// File name prefix shared by every segment
pub const SEGMENT_PREFIX: &str = "segment_";

/// File name for a segment sequence number: 7 → "segment_000007"
pub fn segment_file_name(seq: u64) -> String {
    format!("{}{:06}", SEGMENT_PREFIX, seq)
}

/// Full path of a segment inside `dir`
pub fn segment_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(segment_file_name(seq))
}

/// Parse a segment sequence number from a file name
/// "segment_000042" → Some(42)
pub fn parse_segment_seq(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let seq_str = name.strip_prefix(SEGMENT_PREFIX)?;
    if seq_str.is_empty() || !seq_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seq_str.parse().ok()
}

/// Sequence numbers of all segment files in `dir`, ascending
pub fn list_segments(dir: &Path) -> Result<Vec<u64>> {
    let mut seqs = Vec::new();

    let list_failed = |source| BlockLogError::DirectoryFailed {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(list_failed)? {
        let entry = entry.map_err(list_failed)?;
        let path = entry.path();

        if path.is_file() {
            if let Some(seq) = parse_segment_seq(&path) {
                seqs.push(seq);
            }
        }
    }

    seqs.sort_unstable();
    Ok(seqs)
}

/// Length prefix for a chunk of `chunk_len` bytes
pub fn frame_prefix(chunk_len: usize) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(varint::MAX_VARINT_LEN);
    varint::encode_u64(&mut prefix, chunk_len as u64);
    prefix
}

/// Complete frame (prefix + chunk) for an encoded chunk
pub fn frame_bytes(chunk: &[u8]) -> Vec<u8> {
    let mut frame = frame_prefix(chunk.len());
    frame.extend_from_slice(chunk);
    frame
}

/// On-disk size of the frame holding a chunk of `chunk_len` bytes
pub fn frame_len(chunk_len: usize) -> u64 {
    (varint::encoded_len(chunk_len as u64) + chunk_len) as u64
}
