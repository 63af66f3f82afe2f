//! Unsigned LEB128 varints
//!
//! Each byte carries 7 bits of the value, low bits first; the high bit is set
//! on every byte except the last. Used for frame length prefixes and for the
//! checkpoint record.

use bytes::BufMut;

/// Longest possible encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Encode an unsigned integer as a varint
pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // continuation
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Number of bytes `encode_u64` writes for `value`
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `buf`
///
/// Returns the value and the number of bytes consumed, or `None` when `buf`
/// ends mid-varint or the encoding overflows a u64.
pub fn decode_u64(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;

    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let shift = 7 * i as u32;
        let bits = (byte & 0x7F) as u64;

        // The tenth byte may only contribute the top bit
        if i == MAX_VARINT_LEN - 1 && bits > 1 {
            return None;
        }

        value |= bits << shift;

        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }

    None
}
