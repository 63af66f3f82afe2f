//! Index Store
//!
//! Persistent block id → location mapping plus the single checkpoint record
//! and the adopted-range record, backed by RocksDB.

use std::path::{Path, PathBuf};

use rocksdb::{Options, WriteOptions, DB};
use serde::{Deserialize, Serialize};

use crate::error::{BlockLogError, Result};

use super::Checkpoint;

/// Reserved key holding the checkpoint record
pub const CHECKPOINT_KEY: &[u8] = b"__checkpoint__";

/// Reserved key holding the ranges recovery adopted
pub const ADOPTED_KEY: &[u8] = b"__adopted__";

/// Location of one written chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    /// Segment holding the chunk's frame
    pub segment_seq: u64,
    /// Block identifier (the lookup key)
    pub block_id: String,
    /// Offset of the frame's length prefix
    pub offset: u64,
}

impl BlockIndex {
    pub fn new(segment_seq: u64, block_id: impl Into<String>, offset: u64) -> Self {
        Self {
            segment_seq,
            block_id: block_id.into(),
            offset,
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BlockLogError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| BlockLogError::Serialization(e.to_string()))
    }
}

/// Byte range `[start, end)` of a segment whose frames recovery adopted
///
/// No write acknowledged these frames, so no caller holds their ids and they
/// must never be indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptedRange {
    pub segment_seq: u64,
    pub start: u64,
    pub end: u64,
}

impl AdoptedRange {
    pub fn new(segment_seq: u64, start: u64, end: u64) -> Self {
        Self {
            segment_seq,
            start,
            end,
        }
    }

    /// Whether a frame starting at `offset` of segment `seq` lies inside
    pub fn contains(&self, seq: u64, offset: u64) -> bool {
        self.segment_seq == seq && self.start <= offset && offset < self.end
    }
}

/// Storage for block indexes and the checkpoint
///
/// `durable = true` on a save means the write is on stable storage when the
/// call returns.
pub trait IndexStore: Send + Sync {
    /// Insert or replace the entry keyed by `index.block_id`
    fn save_index(&self, index: &BlockIndex, durable: bool) -> Result<()>;

    /// Look up an entry; `IndexNotFound` when absent
    fn fetch_index(&self, block_id: &str) -> Result<BlockIndex>;

    /// Whether an entry exists for `block_id`
    fn contains_index(&self, block_id: &str) -> Result<bool> {
        match self.fetch_index(block_id) {
            Ok(_) => Ok(true),
            Err(BlockLogError::IndexNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace the checkpoint record
    fn save_checkpoint(&self, checkpoint: &Checkpoint, durable: bool) -> Result<()>;

    /// The stored checkpoint, or `None` for a store that never saved one
    fn fetch_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// Replace the full list of adopted ranges
    fn save_adopted_ranges(&self, ranges: &[AdoptedRange], durable: bool) -> Result<()>;

    /// The stored adopted ranges, empty when none were saved
    fn fetch_adopted_ranges(&self) -> Result<Vec<AdoptedRange>>;

    /// Release the underlying engine
    fn close(self: Box<Self>) -> Result<()>;
}

/// RocksDB-backed index store
pub struct RocksIndexStore {
    db: DB,
    path: PathBuf,
}

impl RocksIndexStore {
    /// Open or create the index database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| {
            BlockLogError::IndexStore(format!(
                "failed to open index store at {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(path = %path.display(), "Index store opened");

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Directory of the database
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_options(durable: bool) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(durable);
        opts
    }
}

impl IndexStore for RocksIndexStore {
    fn save_index(&self, index: &BlockIndex, durable: bool) -> Result<()> {
        let value = index
            .encode()
            .map_err(|e| BlockLogError::IndexSaveFailed(e.to_string()))?;

        self.db
            .put_opt(index.block_id.as_bytes(), value, &Self::write_options(durable))
            .map_err(|e| {
                BlockLogError::IndexSaveFailed(format!("block {}: {}", index.block_id, e))
            })
    }

    fn fetch_index(&self, block_id: &str) -> Result<BlockIndex> {
        let value = self
            .db
            .get(block_id.as_bytes())
            .map_err(|e| BlockLogError::IndexStore(format!("get block {}: {}", block_id, e)))?
            .ok_or_else(|| BlockLogError::IndexNotFound(block_id.to_string()))?;

        BlockIndex::decode(&value)
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint, durable: bool) -> Result<()> {
        self.db
            .put_opt(CHECKPOINT_KEY, checkpoint.marshal(), &Self::write_options(durable))
            .map_err(|e| BlockLogError::CheckpointSaveFailed(e.to_string()))
    }

    fn fetch_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let value = self
            .db
            .get(CHECKPOINT_KEY)
            .map_err(|e| BlockLogError::IndexStore(format!("get checkpoint: {}", e)))?;

        value.map(|bytes| Checkpoint::unmarshal(&bytes)).transpose()
    }

    fn save_adopted_ranges(&self, ranges: &[AdoptedRange], durable: bool) -> Result<()> {
        let value =
            bincode::serialize(ranges).map_err(|e| BlockLogError::Serialization(e.to_string()))?;

        self.db
            .put_opt(ADOPTED_KEY, value, &Self::write_options(durable))
            .map_err(|e| BlockLogError::IndexStore(format!("save adopted ranges: {}", e)))
    }

    fn fetch_adopted_ranges(&self) -> Result<Vec<AdoptedRange>> {
        let value = self
            .db
            .get(ADOPTED_KEY)
            .map_err(|e| BlockLogError::IndexStore(format!("get adopted ranges: {}", e)))?;

        match value {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| BlockLogError::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| BlockLogError::IndexStore(format!("flush on close: {}", e)))?;

        tracing::info!(path = %self.path.display(), "Index store closed");
        Ok(())
    }
}
