//! Startup recovery
//!
//! Rebuilds a trustworthy checkpoint from the index store and the segment
//! files, then cuts any torn tail off the active segment.
//!
//! Complete frames found past a stored checkpoint are adopted: they become
//! part of the log, but their byte range is recorded so index repair never
//! hands out an id that no write returned.

use std::fs;
use std::io;
use std::path::Path;

use crate::codec::decode_chunk;
use crate::error::{BlockLogError, Result};
use crate::index::{AdoptedRange, BlockIndex, Checkpoint, IndexStore};
use crate::segment::{
    list_segments, segment_path, ScanResult, SegmentFileOpener, SegmentScanner, SegmentWriter,
};

/// How an instance was brought up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Whether a checkpoint was stored before this open
    pub checkpoint_found: bool,

    /// The checkpoint as stored, if any
    pub stored_checkpoint: Option<Checkpoint>,

    /// The checkpoint the instance is running from
    pub checkpoint: Checkpoint,

    /// Valid frames seen while re-deriving the checkpoint
    pub frames_scanned: u64,

    /// Frames past the stored checkpoint taken into the log unindexed
    pub frames_adopted: u64,

    /// Torn bytes cut from the active segment
    pub bytes_truncated: u64,

    /// Index entries re-derived from segment contents
    pub indexes_repaired: u64,
}

/// Scan summary for one segment file
#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub segment_seq: u64,
    /// File length on disk
    pub file_len: u64,
    /// Valid prefix of the file
    pub scan: ScanResult,
}

impl SegmentReport {
    /// Bytes past the last valid frame
    pub fn trailing_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.scan.last_good_offset)
    }
}

/// Run recovery and open the writer on the recovered segment
pub(crate) fn recover(
    root_dir: &Path,
    index: &dyn IndexStore,
    opener: &dyn SegmentFileOpener,
    repair_index: bool,
) -> Result<(SegmentWriter, RecoveryReport)> {
    let stored = index.fetch_checkpoint()?;
    let stored_adopted = index.fetch_adopted_ranges()?;
    let mut adopted = stored_adopted.clone();

    let mut report = RecoveryReport {
        checkpoint_found: stored.is_some(),
        stored_checkpoint: stored,
        ..RecoveryReport::default()
    };

    let checkpoint = match stored {
        None => rebuild_checkpoint(root_dir, &mut report)?,
        Some(checkpoint) => reconcile_checkpoint(root_dir, checkpoint, &mut adopted, &mut report)?,
    };

    prune_adopted(&mut adopted, &checkpoint);
    if adopted != stored_adopted {
        // Must be durable before a checkpoint covers the adopted frames
        index.save_adopted_ranges(&adopted, true)?;
    }

    // Persist first so repeated crash/restart cycles converge
    index.save_checkpoint(&checkpoint, true)?;

    let mut writer =
        SegmentWriter::open_with(&segment_path(root_dir, checkpoint.last_segment_seq), opener)?;
    let size_before = writer.size();
    if writer.truncate(checkpoint.last_good_offset)? {
        report.bytes_truncated = size_before - checkpoint.last_good_offset;
        tracing::warn!(
            segment = checkpoint.last_segment_seq,
            offset = checkpoint.last_good_offset,
            bytes = report.bytes_truncated,
            "Discarded torn tail"
        );
    }

    report.checkpoint = checkpoint;

    if repair_index {
        report.indexes_repaired = repair_indexes(root_dir, index, &checkpoint, &adopted)?;
    }

    tracing::info!(
        segment = checkpoint.last_segment_seq,
        offset = checkpoint.last_good_offset,
        checkpoint_found = report.checkpoint_found,
        frames_scanned = report.frames_scanned,
        frames_adopted = report.frames_adopted,
        bytes_truncated = report.bytes_truncated,
        indexes_repaired = report.indexes_repaired,
        "Recovery complete"
    );

    Ok((writer, report))
}

/// No stored checkpoint: derive one from the newest segment on disk
fn rebuild_checkpoint(root_dir: &Path, report: &mut RecoveryReport) -> Result<Checkpoint> {
    let seqs = list_segments(root_dir)?;

    let Some(&last) = seqs.last() else {
        tracing::info!(root = %root_dir.display(), "No segments found, starting fresh");
        return Ok(Checkpoint::default());
    };

    let scan = scan_valid_frames(root_dir, last, 0)?;
    report.frames_scanned += scan.frames;

    // An empty newest segment may be a rotation that crashed before its
    // first frame; the previous segment holds the real tail.
    if scan.frames == 0 && seqs.len() > 1 {
        let previous = seqs[seqs.len() - 2];
        let scan = scan_valid_frames(root_dir, previous, 0)?;
        report.frames_scanned += scan.frames;

        tracing::warn!(
            empty_segment = last,
            segment = previous,
            "Newest segment holds no frames, falling back to previous segment"
        );
        return Ok(Checkpoint::new(previous, scan.last_good_offset));
    }

    Ok(Checkpoint::new(last, scan.last_good_offset))
}

/// Stored checkpoint: check it against the segment's actual length
fn reconcile_checkpoint(
    root_dir: &Path,
    stored: Checkpoint,
    adopted: &mut Vec<AdoptedRange>,
    report: &mut RecoveryReport,
) -> Result<Checkpoint> {
    let seq = stored.last_segment_seq;
    let path = segment_path(root_dir, seq);

    let file_len = match fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if stored.last_good_offset > 0 {
                tracing::error!(
                    path = %path.display(),
                    offset = stored.last_good_offset,
                    "Checkpointed segment is missing"
                );
            }
            return Ok(Checkpoint::new(seq, 0));
        }
        Err(source) => return Err(BlockLogError::SegmentOpenFailed { path, source }),
    };

    if file_len == stored.last_good_offset {
        return Ok(stored);
    }

    if file_len > stored.last_good_offset {
        // Crash between a data append and its checkpoint save
        let scan = scan_valid_frames(root_dir, seq, stored.last_good_offset)?;
        report.frames_scanned += scan.frames;

        if scan.frames > 0 {
            let range = AdoptedRange::new(seq, stored.last_good_offset, scan.last_good_offset);
            if !adopted.contains(&range) {
                adopted.push(range);
            }
            report.frames_adopted += scan.frames;

            tracing::warn!(
                segment = seq,
                frames = scan.frames,
                from = stored.last_good_offset,
                to = scan.last_good_offset,
                "Adopted complete frames written past the checkpoint"
            );
        }
        return Ok(Checkpoint::new(seq, scan.last_good_offset));
    }

    // The file is shorter than the checkpoint claims; only a full rescan
    // can say what is still there.
    tracing::warn!(
        segment = seq,
        file_len,
        checkpoint_offset = stored.last_good_offset,
        "Segment shorter than checkpoint, rescanning"
    );
    let scan = scan_valid_frames(root_dir, seq, 0)?;
    report.frames_scanned += scan.frames;
    Ok(Checkpoint::new(seq, scan.last_good_offset))
}

/// Scan a segment, trusting only frames that decode as chunks
fn scan_valid_frames(root_dir: &Path, seq: u64, start_offset: u64) -> Result<ScanResult> {
    let mut scanner = SegmentScanner::open(root_dir, seq, start_offset)?;
    scanner.scan_to_end_with(|bytes| decode_chunk(bytes).map(|_| ()))
}

/// Drop adopted ranges the recovered checkpoint no longer covers
fn prune_adopted(adopted: &mut Vec<AdoptedRange>, checkpoint: &Checkpoint) {
    for range in adopted.iter_mut() {
        if range.segment_seq == checkpoint.last_segment_seq {
            range.end = range.end.min(checkpoint.last_good_offset);
        }
    }
    adopted.retain(|r| r.segment_seq <= checkpoint.last_segment_seq && r.start < r.end);
}

/// Re-create missing index entries for checkpointed frames
///
/// Covers every segment up to the checkpoint's, skipping adopted ranges.
fn repair_indexes(
    root_dir: &Path,
    index: &dyn IndexStore,
    checkpoint: &Checkpoint,
    adopted: &[AdoptedRange],
) -> Result<u64> {
    let mut repaired = 0;

    for seq in list_segments(root_dir)? {
        if seq > checkpoint.last_segment_seq {
            break;
        }
        let segment_limit = if seq == checkpoint.last_segment_seq {
            checkpoint.last_good_offset
        } else {
            u64::MAX
        };

        for frame in SegmentScanner::open(root_dir, seq, 0)?.frames() {
            let (bytes, placement) = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(segment = seq, error = %e, "Stopped index repair scan");
                    break;
                }
            };
            if placement.frame_end > segment_limit {
                break;
            }
            if adopted.iter().any(|r| r.contains(seq, placement.frame_start)) {
                continue;
            }

            let chunk = match decode_chunk(&bytes) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(
                        segment = seq,
                        offset = placement.frame_start,
                        error = %e,
                        "Undecodable frame, stopping index repair for segment"
                    );
                    break;
                }
            };

            if !index.contains_index(&chunk.id)? {
                index.save_index(
                    &BlockIndex::new(seq, chunk.id.as_str(), placement.frame_start),
                    false,
                )?;
                repaired += 1;
                tracing::warn!(
                    segment = seq,
                    offset = placement.frame_start,
                    block_id = %chunk.id,
                    "Repaired missing index entry"
                );
            }
        }
    }

    if repaired > 0 {
        // A synced write also makes the preceding unsynced index writes durable
        index.save_checkpoint(checkpoint, true)?;
    }

    Ok(repaired)
}

/// Scan one segment read-only and describe its valid prefix
pub fn verify_segment(root_dir: &Path, seq: u64) -> Result<SegmentReport> {
    let path = segment_path(root_dir, seq);
    let file_len = fs::metadata(&path)
        .map_err(|source| BlockLogError::SegmentOpenFailed {
            path: path.clone(),
            source,
        })?
        .len();
    let scan = scan_valid_frames(root_dir, seq, 0)?;

    Ok(SegmentReport {
        segment_seq: seq,
        file_len,
        scan,
    })
}
