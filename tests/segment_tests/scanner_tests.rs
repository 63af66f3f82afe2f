//! Tests for SegmentScanner
//!
//! These tests verify:
//! - Sequential frame reads and clean end-of-file
//! - Torn tails (short prefix, short payload) report UnexpectedEndOfFile
//! - scan_to_end swallows a torn tail and reports the last good offset
//! - Validated scans stop at frames the validator rejects
//! - Frame placement and mid-file start offsets

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use blocklog::codec::{decode_chunk, encode_chunk, Chunk};
use blocklog::segment::{frame_bytes, segment_path, SegmentScanner};
use blocklog::BlockLogError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_root() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    (temp_dir, root)
}

fn encoded(id: &str, payload: &[u8]) -> Vec<u8> {
    encode_chunk(&Chunk::new(id, payload.to_vec())).unwrap()
}

/// Append raw bytes to segment `seq`
fn append_raw(root: &Path, seq: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(segment_path(root, seq))
        .unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// Write `count` well-formed frames, returning the byte length written
fn write_frames(root: &Path, seq: u64, count: usize) -> u64 {
    let mut written = 0;
    for i in 0..count {
        let frame = frame_bytes(&encoded(&format!("id-{}", i), b"helloworld"));
        append_raw(root, seq, &frame);
        written += frame.len() as u64;
    }
    written
}

// =============================================================================
// Sequential Read Tests
// =============================================================================

#[test]
fn test_empty_segment() {
    let (_temp, root) = setup_temp_root();
    append_raw(&root, 0, b"");

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();

    assert!(scanner.next_frame().unwrap().is_none());
    assert_eq!(scanner.current_offset(), 0);
}

#[test]
fn test_read_frames_in_order() {
    let (_temp, root) = setup_temp_root();
    let total = write_frames(&root, 0, 3);

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();

    for i in 0..3 {
        let bytes = scanner.next_frame().unwrap().unwrap();
        let chunk = decode_chunk(&bytes).unwrap();
        assert_eq!(chunk.id, format!("id-{}", i));
        assert_eq!(chunk.payload, b"helloworld");
    }
    assert!(scanner.next_frame().unwrap().is_none());
    assert_eq!(scanner.current_offset(), total);
}

#[test]
fn test_open_at_frame_boundary() {
    let (_temp, root) = setup_temp_root();
    let first = frame_bytes(&encoded("first", b"1"));
    let second = frame_bytes(&encoded("second", b"2"));
    append_raw(&root, 0, &first);
    append_raw(&root, 0, &second);

    let mut scanner = SegmentScanner::open(&root, 0, first.len() as u64).unwrap();
    let chunk = decode_chunk(&scanner.next_frame().unwrap().unwrap()).unwrap();

    assert_eq!(chunk.id, "second");
    assert!(scanner.next_frame().unwrap().is_none());
}

#[test]
fn test_frame_placement() {
    let (_temp, root) = setup_temp_root();
    let first = frame_bytes(&encoded("first", b"abc"));
    let big_chunk = encoded("second", &[7u8; 300]);
    append_raw(&root, 3, &first);
    append_raw(&root, 3, &frame_bytes(&big_chunk));

    let mut scanner = SegmentScanner::open(&root, 3, 0).unwrap();
    let (_, p1) = scanner.next_frame_with_placement().unwrap().unwrap();
    let (bytes, p2) = scanner.next_frame_with_placement().unwrap().unwrap();

    assert_eq!(p1.segment_seq, 3);
    assert_eq!(p1.frame_start, 0);
    assert_eq!(p1.payload_start, 1);
    assert_eq!(p1.frame_end, first.len() as u64);

    assert_eq!(p2.frame_start, first.len() as u64);
    assert_eq!(p2.payload_start, p2.frame_start + 2); // >127 bytes needs 2 prefix bytes
    assert_eq!(p2.frame_end, p2.payload_start + big_chunk.len() as u64);
    assert_eq!(bytes, big_chunk);
}

#[test]
fn test_sees_frames_appended_after_eof() {
    let (_temp, root) = setup_temp_root();
    write_frames(&root, 0, 1);

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();
    assert!(scanner.next_frame().unwrap().is_some());
    assert!(scanner.next_frame().unwrap().is_none());

    append_raw(&root, 0, &frame_bytes(&encoded("late", b"data")));

    let chunk = decode_chunk(&scanner.next_frame().unwrap().unwrap()).unwrap();
    assert_eq!(chunk.id, "late");
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_next_frame_torn_payload() {
    let (_temp, root) = setup_temp_root();
    let good = write_frames(&root, 0, 1);
    let frame = frame_bytes(&encoded("torn", b"will be cut"));
    append_raw(&root, 0, &frame[..frame.len() - 4]);

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();
    scanner.next_frame().unwrap().unwrap();
    let result = scanner.next_frame();

    match result {
        Err(BlockLogError::UnexpectedEndOfFile { offset, .. }) => assert_eq!(offset, good),
        other => panic!("expected UnexpectedEndOfFile, got {:?}", other),
    }
    // A failed read leaves the scanner at the last good boundary
    assert_eq!(scanner.current_offset(), good);
}

#[test]
fn test_torn_frame_readable_once_completed() {
    let (_temp, root) = setup_temp_root();
    write_frames(&root, 0, 1);
    let frame = frame_bytes(&encoded("late", b"arrives in two parts"));
    append_raw(&root, 0, &frame[..6]);

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();
    scanner.next_frame().unwrap().unwrap();
    assert!(scanner.next_frame().is_err());

    // The failed read rewound the stream, so the rest of the frame lines up
    append_raw(&root, 0, &frame[6..]);

    let chunk = decode_chunk(&scanner.next_frame().unwrap().unwrap()).unwrap();
    assert_eq!(chunk.id, "late");
    assert!(scanner.next_frame().unwrap().is_none());
}

#[test]
fn test_next_frame_torn_prefix() {
    let (_temp, root) = setup_temp_root();
    write_frames(&root, 0, 1);
    append_raw(&root, 0, &[0x80]); // continuation bit with nothing after

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();
    scanner.next_frame().unwrap().unwrap();

    assert!(matches!(
        scanner.next_frame(),
        Err(BlockLogError::UnexpectedEndOfFile { .. })
    ));
}

#[test]
fn test_next_frame_undecodable_prefix_with_more_data() {
    let (_temp, root) = setup_temp_root();
    append_raw(&root, 0, &[0xFF; 16]);

    let mut scanner = SegmentScanner::open(&root, 0, 0).unwrap();

    assert!(matches!(
        scanner.next_frame(),
        Err(BlockLogError::CorruptChunk(_))
    ));
}

#[test]
fn test_start_offset_past_end_of_file() {
    let (_temp, root) = setup_temp_root();
    let total = write_frames(&root, 0, 1);

    let mut scanner = SegmentScanner::open(&root, 0, total + 10).unwrap();

    assert!(matches!(
        scanner.next_frame(),
        Err(BlockLogError::UnexpectedEndOfFile { .. })
    ));
}

#[test]
fn test_open_missing_segment() {
    let (_temp, root) = setup_temp_root();

    let result = SegmentScanner::open(&root, 7, 0);

    assert!(matches!(result, Err(BlockLogError::SegmentOpenFailed { .. })));
}

// =============================================================================
// scan_to_end Tests
// =============================================================================

#[test]
fn test_scan_to_end_clean_segment() {
    let (_temp, root) = setup_temp_root();
    let total = write_frames(&root, 0, 5);

    let result = SegmentScanner::open(&root, 0, 0).unwrap().scan_to_end().unwrap();

    assert_eq!(result.frames, 5);
    assert_eq!(result.last_good_offset, total);
    let last = decode_chunk(&result.last_frame.unwrap()).unwrap();
    assert_eq!(last.id, "id-4");
}

#[test]
fn test_scan_to_end_ignores_trailing_garbage() {
    let (_temp, root) = setup_temp_root();
    let valid = write_frames(&root, 0, 3);
    append_raw(&root, 0, b"trail");

    let result = SegmentScanner::open(&root, 0, 0).unwrap().scan_to_end().unwrap();

    assert_eq!(result.frames, 3);
    assert_eq!(result.last_good_offset, valid);
    assert_eq!(fs::metadata(segment_path(&root, 0)).unwrap().len(), valid + 5);
}

#[test]
fn test_scan_to_end_empty_segment() {
    let (_temp, root) = setup_temp_root();
    append_raw(&root, 0, b"");

    let result = SegmentScanner::open(&root, 0, 0).unwrap().scan_to_end().unwrap();

    assert_eq!(result.frames, 0);
    assert_eq!(result.last_good_offset, 0);
    assert!(result.last_frame.is_none());
}

#[test]
fn test_scan_to_end_from_mid_offset() {
    let (_temp, root) = setup_temp_root();
    let first = write_frames(&root, 0, 2);
    let frame = frame_bytes(&encoded("third", b"x"));
    append_raw(&root, 0, &frame);
    append_raw(&root, 0, &[0x40]); // declares 64 bytes, has none

    let result = SegmentScanner::open(&root, 0, first).unwrap().scan_to_end().unwrap();

    assert_eq!(result.frames, 1);
    assert_eq!(result.last_good_offset, first + frame.len() as u64);
}

#[test]
fn test_scan_to_end_with_validator_stops_at_bad_frame() {
    let (_temp, root) = setup_temp_root();
    let valid = write_frames(&root, 0, 2);
    // Well-framed but not a chunk
    append_raw(&root, 0, &frame_bytes(b"not a chunk at all"));
    write_frames(&root, 0, 1);

    let framing_only = SegmentScanner::open(&root, 0, 0).unwrap().scan_to_end().unwrap();
    let validated = SegmentScanner::open(&root, 0, 0)
        .unwrap()
        .scan_to_end_with(|bytes| decode_chunk(bytes).map(|_| ()))
        .unwrap();

    assert_eq!(framing_only.frames, 4);
    assert_eq!(validated.frames, 2);
    assert_eq!(validated.last_good_offset, valid);
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_frames_iterator_stops_at_torn_tail() {
    let (_temp, root) = setup_temp_root();
    let valid = write_frames(&root, 0, 4);
    append_raw(&root, 0, b"uselessdata");

    let mut frames = SegmentScanner::open(&root, 0, 0).unwrap().frames();
    let mut ok = 0;
    let mut errors = 0;
    for frame in frames.by_ref() {
        match frame {
            Ok(_) => ok += 1,
            Err(_) => errors += 1,
        }
    }

    assert_eq!(ok, 4);
    assert_eq!(errors, 1);
    assert_eq!(frames.current_offset(), valid);
    assert!(frames.next().is_none());
}
