//! Segment Scanner
//!
//! Sequential frame reader over one segment, starting at any frame boundary.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::varint;
use crate::error::{BlockLogError, Result};

use super::segment_path;

/// Bytes examined when decoding a length prefix
const PEEK_LEN: usize = 8;

/// Where a frame lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlacement {
    /// Segment holding the frame
    pub segment_seq: u64,
    /// Offset of the length prefix
    pub frame_start: u64,
    /// Offset of the first chunk byte
    pub payload_start: u64,
    /// Offset just past the frame
    pub frame_end: u64,
}

/// Outcome of scanning a segment to its last trustworthy frame
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Chunk bytes of the last valid frame, if any
    pub last_frame: Option<Vec<u8>>,
    /// Offset immediately after the last valid frame
    pub last_good_offset: u64,
    /// Number of valid frames scanned
    pub frames: u64,
}

/// Reads frames from a segment file
pub struct SegmentScanner {
    segment_seq: u64,
    path: PathBuf,
    reader: BufReader<File>,
    /// Offset just past the last fully read frame
    current_offset: u64,
    /// The stream position may differ from `current_offset`
    needs_seek: bool,
}

impl SegmentScanner {
    /// Open segment `segment_seq` under `root_dir`, positioned at `start_offset`
    ///
    /// `start_offset` must be a frame boundary.
    pub fn open(root_dir: &Path, segment_seq: u64, start_offset: u64) -> Result<Self> {
        let path = segment_path(root_dir, segment_seq);
        let open_failed = |source| BlockLogError::SegmentOpenFailed {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).map_err(open_failed)?;
        let position = file.seek(SeekFrom::Start(start_offset)).map_err(open_failed)?;
        if position != start_offset {
            return Err(open_failed(io::Error::new(
                io::ErrorKind::Other,
                format!("seek to {} landed at {}", start_offset, position),
            )));
        }

        Ok(Self {
            segment_seq,
            path,
            reader: BufReader::new(file),
            current_offset: start_offset,
            needs_seek: false,
        })
    }

    /// Read the next frame's chunk bytes
    ///
    /// - `Ok(Some(bytes))`: a complete frame
    /// - `Ok(None)`: positioned exactly at end of file
    /// - `Err(UnexpectedEndOfFile)`: fewer bytes remain than the frame needs
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.next_frame_with_placement()?.map(|(bytes, _)| bytes))
    }

    /// Read the next frame along with its position in the segment
    pub fn next_frame_with_placement(&mut self) -> Result<Option<(Vec<u8>, FramePlacement)>> {
        if self.needs_seek {
            self.reader
                .seek(SeekFrom::Start(self.current_offset))
                .map_err(|e| self.read_failed(e))?;
            self.needs_seek = false;
        }

        let result = self.read_frame();
        if result.is_err() {
            // Leave the stream at the last good boundary
            if let Err(e) = self.reader.seek(SeekFrom::Start(self.current_offset)) {
                tracing::warn!(
                    path = %self.path.display(),
                    offset = self.current_offset,
                    error = %e,
                    "Failed to rewind scanner, retrying on next read"
                );
                self.needs_seek = true;
            }
        }
        result
    }

    fn read_frame(&mut self) -> Result<Option<(Vec<u8>, FramePlacement)>> {
        let file_len = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| self.read_failed(e))?
            .len();

        if self.current_offset == file_len {
            return Ok(None);
        }
        if self.current_offset > file_len {
            return Err(self.unexpected_eof());
        }

        let remaining = file_len - self.current_offset;
        let more_available = remaining > PEEK_LEN as u64;
        let peek_len = remaining.min(PEEK_LEN as u64) as usize;

        let mut peek = [0u8; PEEK_LEN];
        self.reader
            .read_exact(&mut peek[..peek_len])
            .map_err(|e| self.map_read_error(e))?;

        let (chunk_len, prefix_len) = match varint::decode_u64(&peek[..peek_len]) {
            Some(decoded) => decoded,
            None if !more_available => return Err(self.unexpected_eof()),
            None => {
                return Err(BlockLogError::CorruptChunk(format!(
                    "undecodable length prefix in {} at offset {}",
                    self.path.display(),
                    self.current_offset
                )))
            }
        };

        // Hand back the peeked bytes that belong to the chunk
        self.reader
            .seek_relative(prefix_len as i64 - peek_len as i64)
            .map_err(|e| self.read_failed(e))?;

        let available = remaining - prefix_len as u64;
        if chunk_len > available {
            return Err(self.unexpected_eof());
        }

        let mut chunk = vec![0u8; chunk_len as usize];
        self.reader
            .read_exact(&mut chunk)
            .map_err(|e| self.map_read_error(e))?;

        let frame_start = self.current_offset;
        let payload_start = frame_start + prefix_len as u64;
        let frame_end = payload_start + chunk_len;
        self.current_offset = frame_end;

        tracing::trace!(
            segment = self.segment_seq,
            offset = frame_start,
            len = chunk_len,
            "Scanned frame"
        );

        Ok(Some((
            chunk,
            FramePlacement {
                segment_seq: self.segment_seq,
                frame_start,
                payload_start,
                frame_end,
            },
        )))
    }

    /// Scan forward to the last complete frame
    ///
    /// A torn or undecodable tail ends the scan without an error; the result
    /// describes everything before it.
    pub fn scan_to_end(&mut self) -> Result<ScanResult> {
        self.scan_to_end_with(|_| Ok(()))
    }

    /// Scan forward, also requiring `check` to accept each frame's bytes
    ///
    /// The first frame `check` rejects ends the scan and is not counted.
    pub fn scan_to_end_with<F>(&mut self, mut check: F) -> Result<ScanResult>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut result = ScanResult {
            last_frame: None,
            last_good_offset: self.current_offset,
            frames: 0,
        };

        loop {
            match self.next_frame_with_placement() {
                Ok(Some((bytes, placement))) => {
                    if let Err(e) = check(&bytes) {
                        tracing::debug!(
                            segment = self.segment_seq,
                            offset = placement.frame_start,
                            error = %e,
                            "Frame rejected, ending scan"
                        );
                        break;
                    }
                    result.frames += 1;
                    result.last_good_offset = placement.frame_end;
                    result.last_frame = Some(bytes);
                }
                Ok(None) => break,
                Err(BlockLogError::UnexpectedEndOfFile { offset, .. }) => {
                    tracing::debug!(
                        segment = self.segment_seq,
                        offset,
                        "Torn frame at end of segment"
                    );
                    break;
                }
                Err(BlockLogError::CorruptChunk(msg)) => {
                    tracing::debug!(segment = self.segment_seq, %msg, "Corrupt frame, ending scan");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    /// Iterate over the remaining frames
    pub fn frames(self) -> FrameIter {
        FrameIter {
            scanner: self,
            done: false,
        }
    }

    /// Offset just past the last fully read frame
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Sequence number of the segment being scanned
    pub fn segment_seq(&self) -> u64 {
        self.segment_seq
    }

    /// Path of the segment being scanned
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unexpected_eof(&self) -> BlockLogError {
        BlockLogError::UnexpectedEndOfFile {
            path: self.path.clone(),
            offset: self.current_offset,
        }
    }

    fn read_failed(&self, source: io::Error) -> BlockLogError {
        BlockLogError::ReadFailed {
            path: self.path.clone(),
            offset: self.current_offset,
            source,
        }
    }

    fn map_read_error(&self, e: io::Error) -> BlockLogError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            self.unexpected_eof()
        } else {
            self.read_failed(e)
        }
    }
}

/// Iterator over frames; stops after the first error
pub struct FrameIter {
    scanner: SegmentScanner,
    done: bool,
}

impl FrameIter {
    /// Offset just past the last frame yielded
    pub fn current_offset(&self) -> u64 {
        self.scanner.current_offset()
    }
}

impl Iterator for FrameIter {
    type Item = Result<(Vec<u8>, FramePlacement)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.scanner.next_frame_with_placement() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
