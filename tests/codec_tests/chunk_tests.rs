//! Tests for the Chunk Codec
//!
//! These tests verify:
//! - Encode/decode round-trip of id + payload
//! - Empty and binary payloads
//! - Garbage, truncated and bit-flipped input fail with CorruptChunk
//! - Frame helpers agree with the varint prefix length

use blocklog::codec::{decode_chunk, encode_chunk, Chunk, CHECKSUM_SIZE};
use blocklog::segment::{frame_bytes, frame_len, frame_prefix};
use blocklog::BlockLogError;

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_chunk_roundtrip() {
    let chunk = Chunk::new("block-1", b"hello, world".to_vec());

    let encoded = encode_chunk(&chunk).unwrap();
    let decoded = decode_chunk(&encoded).unwrap();

    assert_eq!(decoded, chunk);
}

#[test]
fn test_chunk_methods_match_free_functions() {
    let chunk = Chunk::new("block-2", vec![1, 2, 3]);

    let encoded = chunk.encode().unwrap();
    assert_eq!(encoded, encode_chunk(&chunk).unwrap());
    assert_eq!(Chunk::decode(&encoded).unwrap(), chunk);
}

#[test]
fn test_chunk_empty_payload() {
    let chunk = Chunk::new("empty", Vec::new());

    let decoded = decode_chunk(&encode_chunk(&chunk).unwrap()).unwrap();

    assert_eq!(decoded.id, "empty");
    assert!(decoded.payload.is_empty());
}

#[test]
fn test_chunk_binary_payload() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let chunk = Chunk::new("binary", payload.clone());

    let decoded = decode_chunk(&encode_chunk(&chunk).unwrap()).unwrap();

    assert_eq!(decoded.payload, payload);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_decode_too_short() {
    let result = decode_chunk(&[0x01, 0x02]);
    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));

    let result = decode_chunk(&[]);
    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

#[test]
fn test_decode_garbage() {
    let garbage = b"this is definitely not a chunk".to_vec();

    let result = decode_chunk(&garbage);

    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

#[test]
fn test_decode_flipped_payload_byte() {
    let mut encoded = encode_chunk(&Chunk::new("id", b"payload".to_vec())).unwrap();
    let last = encoded.len() - 1;
    encoded[last] ^= 0xFF;

    let result = decode_chunk(&encoded);

    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

#[test]
fn test_decode_flipped_checksum_byte() {
    let mut encoded = encode_chunk(&Chunk::new("id", b"payload".to_vec())).unwrap();
    encoded[0] ^= 0x01;

    let result = decode_chunk(&encoded);

    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

#[test]
fn test_decode_truncated_body() {
    let encoded = encode_chunk(&Chunk::new("id", b"some longer payload".to_vec())).unwrap();

    let result = decode_chunk(&encoded[..encoded.len() - 3]);

    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

#[test]
fn test_decode_checksum_only() {
    let result = decode_chunk(&[0u8; CHECKSUM_SIZE]);
    assert!(matches!(result, Err(BlockLogError::CorruptChunk(_))));
}

// =============================================================================
// Frame Helper Tests
// =============================================================================

#[test]
fn test_frame_prefix_small_chunk() {
    assert_eq!(frame_prefix(0), vec![0x00]);
    assert_eq!(frame_prefix(127), vec![0x7F]);
    assert_eq!(frame_prefix(128), vec![0x80, 0x01]);
}

#[test]
fn test_frame_bytes_layout() {
    let chunk = vec![0xAA; 200];

    let frame = frame_bytes(&chunk);

    assert_eq!(frame.len() as u64, frame_len(chunk.len()));
    assert_eq!(&frame[..2], &[0xC8, 0x01]); // 200 as varint
    assert_eq!(&frame[2..], chunk.as_slice());
}
