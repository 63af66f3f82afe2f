//! Store Manager
//!
//! The only entry point: owns the active segment, runs recovery on open,
//! rotates segments and implements write / read / close.
//!
//! ## Write Path
//! ```text
//! encode chunk → [rotate?] → append prefix + chunk (durable)
//!              → save checkpoint (durable) → save block index (durable)
//! ```
//! The checkpoint is saved before the index entry so that no id is ever
//! indexed past the checkpoint's known-good boundary.
//!
//! ## Read Path
//! ```text
//! fetch block index → open scanner at offset → one frame → decode chunk
//! ```

mod recovery;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::codec::{decode_chunk, encode_chunk, Chunk};
use crate::config::Config;
use crate::error::{BlockLogError, Result};
use crate::index::{BlockIndex, Checkpoint, IndexStore, RocksIndexStore};
use crate::segment::{
    frame_prefix, list_segments, segment_path, FsSegmentOpener, SegmentFileOpener,
    SegmentScanner, SegmentWriter,
};

pub use recovery::{verify_segment, RecoveryReport, SegmentReport};

/// The open tail segment and the checkpoint that describes it
struct ActiveSegment {
    writer: SegmentWriter,
    checkpoint: Checkpoint,
}

/// Append-only block store over rotating segments
///
/// ## Concurrency
/// - `active`: held for the whole of a write, so writes are serialized and
///   rotation swaps the writer atomically with the checkpoint
/// - Reads take no lock: they hit the index store and open their own file
///   handle, observing only durable state
/// - `poisoned`: set when cleanup after a failed write cannot restore the
///   segment; later writes are refused
pub struct StoreManager {
    config: Config,
    index: Box<dyn IndexStore>,
    segments: Box<dyn SegmentFileOpener>,
    active: Mutex<ActiveSegment>,
    poisoned: AtomicBool,
    report: RecoveryReport,
}

impl StoreManager {
    /// Open or create a store with default settings
    pub fn open(root_dir: &Path, index_dir: &Path) -> Result<Self> {
        let config = Config::builder()
            .root_dir(root_dir)
            .index_dir(index_dir)
            .build()?;
        Self::open_with_config(config)
    }

    /// Open or create a store backed by RocksDB at `config.index_dir`
    pub fn open_with_config(config: Config) -> Result<Self> {
        config.validate()?;
        create_dir(&config.root_dir)?;
        create_dir(&config.index_dir)?;

        let index = RocksIndexStore::open(&config.index_dir)?;
        Self::open_with_index(config, Box::new(index))
    }

    /// Open a store over an already opened index store
    pub fn open_with_index(config: Config, index: Box<dyn IndexStore>) -> Result<Self> {
        Self::open_with_storage(config, index, Box::new(FsSegmentOpener))
    }

    /// Open a store over a given index store and segment file backend
    ///
    /// On startup:
    /// 1. Create the segment directory if missing
    /// 2. Load or rebuild the checkpoint, reconciling it with the files
    /// 3. Record adopted frame ranges, then persist the checkpoint durably
    /// 4. Open the active segment and cut any torn tail
    pub fn open_with_storage(
        config: Config,
        index: Box<dyn IndexStore>,
        segments: Box<dyn SegmentFileOpener>,
    ) -> Result<Self> {
        config.validate()?;
        create_dir(&config.root_dir)?;

        let (writer, report) = recovery::recover(
            &config.root_dir,
            index.as_ref(),
            segments.as_ref(),
            config.repair_index_on_open,
        )?;

        tracing::info!(
            root = %config.root_dir.display(),
            index = %config.index_dir.display(),
            segment = report.checkpoint.last_segment_seq,
            offset = report.checkpoint.last_good_offset,
            "Store opened"
        );

        Ok(Self {
            active: Mutex::new(ActiveSegment {
                writer,
                checkpoint: report.checkpoint,
            }),
            config,
            index,
            segments,
            poisoned: AtomicBool::new(false),
            report,
        })
    }

    /// Store a payload and return its block id
    pub fn write(&self, payload: &[u8]) -> Result<String> {
        self.ensure_writable()?;

        let block_id = new_block_id();
        let chunk = encode_chunk(&Chunk::new(block_id.as_str(), payload))?;
        let prefix = frame_prefix(chunk.len());
        let frame_len = (prefix.len() + chunk.len()) as u64;

        let mut active = self.active.lock();

        // Re-check under the lock: a concurrent write may have poisoned us
        self.ensure_writable()?;

        if active.checkpoint.last_good_offset > 0
            && active.checkpoint.last_good_offset + frame_len > self.config.max_segment_size
        {
            self.rotate(&mut active)?;
        }

        let segment_seq = active.checkpoint.last_segment_seq;
        let frame_start = active.checkpoint.last_good_offset;

        if let Err(e) = append_frame(&mut active.writer, &prefix, &chunk) {
            self.truncate_back(&mut active.writer, frame_start)?;
            return Err(e);
        }

        let checkpoint = Checkpoint::new(segment_seq, frame_start + frame_len);
        if let Err(e) = self.index.save_checkpoint(&checkpoint, true) {
            self.truncate_back(&mut active.writer, frame_start)?;
            return Err(e);
        }

        // The checkpoint is durable; memory must follow even if indexing fails
        active.checkpoint = checkpoint;

        let block_index = BlockIndex::new(segment_seq, block_id.as_str(), frame_start);
        self.index.save_index(&block_index, true)?;

        tracing::debug!(
            block_id = %block_id,
            segment = segment_seq,
            offset = frame_start,
            len = frame_len,
            "Wrote block"
        );

        Ok(block_id)
    }

    /// Fetch the payload stored under `block_id`
    pub fn read(&self, block_id: &str) -> Result<Vec<u8>> {
        let index = self.index.fetch_index(block_id)?;

        let mut scanner =
            SegmentScanner::open(&self.config.root_dir, index.segment_seq, index.offset)?;

        // An indexed frame that is missing means index and data diverged
        let bytes = scanner
            .next_frame()?
            .ok_or_else(|| BlockLogError::UnexpectedEndOfFile {
                path: scanner.path().to_path_buf(),
                offset: index.offset,
            })?;

        let chunk = decode_chunk(&bytes)?;
        if chunk.id != block_id {
            return Err(BlockLogError::CorruptChunk(format!(
                "block id mismatch at segment {} offset {}: expected {}, found {}",
                index.segment_seq, index.offset, block_id, chunk.id
            )));
        }

        tracing::debug!(
            block_id,
            segment = index.segment_seq,
            offset = index.offset,
            "Read block"
        );

        Ok(chunk.payload)
    }

    /// Close the index store, then the active segment
    ///
    /// Both are attempted; the first failure is returned.
    pub fn close(self) -> Result<()> {
        let StoreManager { index, active, .. } = self;
        let ActiveSegment { writer, checkpoint } = active.into_inner();

        let index_result = index.close();
        let writer_result = writer.close();

        if let Err(e) = &index_result {
            tracing::warn!(error = %e, "Failed to close index store");
        }
        if let Err(e) = &writer_result {
            tracing::warn!(error = %e, "Failed to close active segment");
        }

        tracing::info!(
            segment = checkpoint.last_segment_seq,
            offset = checkpoint.last_good_offset,
            "Store closed"
        );

        index_result.and(writer_result)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The in-memory checkpoint
    pub fn checkpoint(&self) -> Checkpoint {
        self.active.lock().checkpoint
    }

    /// Sequence number of the segment receiving writes
    pub fn current_segment_seq(&self) -> u64 {
        self.checkpoint().last_segment_seq
    }

    /// Offset at which the next frame will start
    pub fn current_offset(&self) -> u64 {
        self.checkpoint().last_good_offset
    }

    /// Number of segment files on disk
    pub fn segment_count(&self) -> Result<usize> {
        Ok(list_segments(&self.config.root_dir)?.len())
    }

    /// What recovery did when this instance was opened
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.report
    }

    /// Whether a failed cleanup has disabled writes
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Get the segment directory
    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    /// Get the index directory
    pub fn index_dir(&self) -> &Path {
        &self.config.index_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan one segment read-only (usable without opening a store)
    pub fn verify_segment(root_dir: &Path, seq: u64) -> Result<SegmentReport> {
        verify_segment(root_dir, seq)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Move writes to the next segment
    ///
    /// The new checkpoint is saved before the writer is swapped, so a failure
    /// leaves the old segment active and the store recoverable.
    fn rotate(&self, active: &mut ActiveSegment) -> Result<()> {
        let next_seq = active.checkpoint.last_segment_seq + 1;

        let mut writer = SegmentWriter::open_with(
            &segment_path(&self.config.root_dir, next_seq),
            self.segments.as_ref(),
        )?;
        // Drop anything an earlier crashed rotation left behind
        writer.truncate(0)?;

        let checkpoint = Checkpoint::new(next_seq, 0);
        self.index.save_checkpoint(&checkpoint, true)?;

        let previous = std::mem::replace(&mut active.writer, writer);
        let previous_offset = active.checkpoint.last_good_offset;
        active.checkpoint = checkpoint;

        if let Err(e) = previous.close() {
            tracing::warn!(error = %e, segment = next_seq - 1, "Failed to close rotated segment");
        }

        tracing::info!(
            from = next_seq - 1,
            to = next_seq,
            size = previous_offset,
            "Rotated segment"
        );
        Ok(())
    }

    /// Cut a failed write back off the segment, poisoning on failure
    fn truncate_back(&self, writer: &mut SegmentWriter, len: u64) -> Result<()> {
        match writer.truncate(len) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.poisoned.store(true, Ordering::SeqCst);
                tracing::error!(
                    path = %writer.path().display(),
                    offset = len,
                    error = %e,
                    "Truncate after failed write failed, refusing further writes"
                );
                Err(BlockLogError::Poisoned(format!(
                    "could not truncate {} back to {}: {}",
                    writer.path().display(),
                    len,
                    e
                )))
            }
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(BlockLogError::Poisoned(
                "an earlier write could not be rolled back; reopen the store".to_string(),
            ));
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| BlockLogError::DirectoryFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Length prefix without sync, chunk with sync
fn append_frame(writer: &mut SegmentWriter, prefix: &[u8], chunk: &[u8]) -> Result<()> {
    writer.append(prefix, false)?;
    writer.append(chunk, true)
}

/// Fresh, collision-free block identifier
fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}
