//! Segment Writer
//!
//! Owns the open tail segment: appends raw bytes and truncates torn tails.

use std::path::{Path, PathBuf};

use crate::error::{BlockLogError, Result};

use super::file::{FsSegmentOpener, SegmentFile, SegmentFileOpener};

/// Appends bytes to one segment file
pub struct SegmentWriter {
    /// Segment file path (for error context)
    path: PathBuf,
    /// File opened for append
    file: Box<dyn SegmentFile>,
    /// Bytes known to be in the file after the last successful call
    size: u64,
}

impl SegmentWriter {
    /// Create or open a segment file on the local filesystem
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &FsSegmentOpener)
    }

    /// Create or open a segment through `opener`
    pub fn open_with(path: &Path, opener: &dyn SegmentFileOpener) -> Result<Self> {
        let open_failed = |source| BlockLogError::SegmentOpenFailed {
            path: path.to_path_buf(),
            source,
        };

        let file = opener.open(path).map_err(open_failed)?;
        let size = file.size().map_err(open_failed)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Append bytes at the end of the file
    ///
    /// With `durable`, file data is flushed to stable storage before
    /// returning. On failure the file may hold a partial write; the caller
    /// truncates back to the size it captured beforehand.
    pub fn append(&mut self, data: &[u8], durable: bool) -> Result<()> {
        let offset = self.size;
        let write_failed = |source| BlockLogError::WriteFailed {
            path: self.path.clone(),
            offset,
            source,
        };

        self.file.append(data).map_err(write_failed)?;
        if durable {
            self.file.sync_data().map_err(write_failed)?;
        }

        self.size += data.len() as u64;
        Ok(())
    }

    /// Shrink the file to `new_len` bytes
    ///
    /// Never extends: a file already at or below `new_len` is left alone.
    /// Returns whether any bytes were removed.
    pub fn truncate(&mut self, new_len: u64) -> Result<bool> {
        let truncate_failed = |source| BlockLogError::TruncateFailed {
            path: self.path.clone(),
            len: new_len,
            source,
        };

        let current = self.file.size().map_err(truncate_failed)?;
        if current <= new_len {
            self.size = current;
            return Ok(false);
        }

        self.file.truncate(new_len).map_err(truncate_failed)?;
        self.file.sync_all().map_err(truncate_failed)?;
        self.size = new_len;

        tracing::debug!(
            path = %self.path.display(),
            from = current,
            to = new_len,
            "Truncated segment"
        );
        Ok(true)
    }

    /// Force file data and metadata to disk
    pub fn sync(&mut self) -> Result<()> {
        let offset = self.size;
        self.file
            .sync_all()
            .map_err(|source| BlockLogError::WriteFailed {
                path: self.path.clone(),
                offset,
                source,
            })
    }

    /// Sync and release the file handle
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// Current size of the segment in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
