//! Variable-byte integer coding.
//!
//! Each byte carries 7 value bits, least significant group first; the high
//! bit is set on every byte except the last. A `u32` takes 1 to 5 bytes.

/// Largest encoded size of a `u32`
pub const MAX_ENCODED_LEN: usize = 5;

/// Encode a u32 as a variable-length integer, returning the bytes written
#[inline]
pub fn encode(mut value: u32, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.len() - start
}

/// Decode a variable-length integer from a slice.
/// Returns (value, bytes_consumed), or None on truncated or overlong input.
#[inline]
pub fn decode(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_ENCODED_LEN {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Number of bytes `encode` would write for `value`
#[inline]
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Delta-encode an ascending list of u32s.
///
/// Values must be non-decreasing; a smaller value after a larger one wraps
/// and produces garbage on decode. Callers sort first.
pub fn encode_many(values: &[u32], buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    let mut prev = 0u32;
    for &value in values {
        encode(value.wrapping_sub(prev), buf);
        prev = value;
    }
    buf.len() - start
}

/// Delta-decode `count` values from `buf` into `out`.
/// Returns the number of bytes consumed; stops early on truncated input.
pub fn decode_many(buf: &[u8], count: usize, out: &mut Vec<u32>) -> usize {
    // Every value takes at least one byte
    out.reserve(count.min(buf.len()));
    let mut prev = 0u32;
    let mut pos = 0;

    for _ in 0..count {
        match decode(&buf[pos..]) {
            Some((delta, consumed)) => {
                prev = prev.wrapping_add(delta);
                out.push(prev);
                pos += consumed;
            }
            None => break,
        }
    }

    pos
}
