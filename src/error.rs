//! Error types for blocklog
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using BlockLogError
pub type Result<T> = std::result::Result<T, BlockLogError>;

/// Unified error type for blocklog operations
#[derive(Debug, Error)]
pub enum BlockLogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("failed to open segment {path}: {source}")]
    SegmentOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to segment {path} at offset {offset} failed: {source}")]
    WriteFailed {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("truncate of segment {path} to {len} bytes failed: {source}")]
    TruncateFailed {
        path: PathBuf,
        len: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("read of segment {path} at offset {offset} failed: {source}")]
    ReadFailed {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("directory operation on {path} failed: {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Segment / Frame Errors
    // -------------------------------------------------------------------------
    #[error("unexpected end of file in {path} at offset {offset}")]
    UnexpectedEndOfFile { path: PathBuf, offset: u64 },

    #[error("corrupt chunk: {0}")]
    CorruptChunk(String),

    #[error("failed to encode chunk: {0}")]
    ChunkEncodeFailed(String),

    // -------------------------------------------------------------------------
    // Index / Checkpoint Errors
    // -------------------------------------------------------------------------
    #[error("index not found for block {0}")]
    IndexNotFound(String),

    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    #[error("checkpoint save failed: {0}")]
    CheckpointSaveFailed(String),

    #[error("index save failed: {0}")]
    IndexSaveFailed(String),

    #[error("index store error: {0}")]
    IndexStore(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Fatal State
    // -------------------------------------------------------------------------
    /// The on-disk invariant can no longer be trusted; the instance refuses
    /// further writes until it is reopened.
    #[error("store poisoned: {0}")]
    Poisoned(String),
}

impl BlockLogError {
    /// True for a lookup miss, which callers usually map to "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlockLogError::IndexNotFound(_))
    }
}
