//! Segment file backend
//!
//! The writer talks to segment files only through `SegmentFile`, and the
//! store opens them only through a `SegmentFileOpener`. The filesystem
//! implementation is the default; other implementations can wrap it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Byte-level operations on one open segment file
///
/// # Invariants
/// - `append` writes at the end of the file
/// - `sync_data` makes appended bytes durable
/// - `truncate` never needs to extend the file
pub trait SegmentFile: Send {
    /// Write all of `data` at the end of the file
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush file contents to stable storage
    fn sync_data(&mut self) -> io::Result<()>;

    /// Flush file contents and metadata to stable storage
    fn sync_all(&mut self) -> io::Result<()>;

    /// Current length of the file in bytes
    fn size(&self) -> io::Result<u64>;

    /// Cut the file to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

/// Opens (creating if needed) segment files for appending
pub trait SegmentFileOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SegmentFile>>;
}

impl SegmentFile for File {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Plain files on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSegmentOpener;

impl SegmentFileOpener for FsSegmentOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SegmentFile>> {
        // Append mode: every write lands at the current end of file
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(Box::new(file))
    }
}
