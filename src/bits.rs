//! Bit-field conversion utilities.
//!
//! Frames travel on the wire as ASCII bitstrings (`'0'`/`'1'` characters),
//! so every fixed-width field has to be converted between its typed integer
//! form and its string form at the codec boundary.  This module owns those
//! conversions plus payload chunking:
//! - [`int_to_bits`] / [`bits_to_int`] — unsigned integer ↔ fixed-width field
//! - [`bytes_to_bits`] / [`bits_to_bytes`] — payload bytes ↔ bit encoding
//! - [`split_chunks`] — split a payload into bounded-size pieces
//!
//! No protocol knowledge lives here; field offsets and widths belong to
//! [`crate::frame`].

use thiserror::Error;

/// Errors from bit-field conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitFieldError {
    /// A character other than '0' or '1' appeared in a bit field.
    #[error("non-binary digit {0:?} in bit field")]
    NonBinaryDigit(char),

    /// A field wider than 32 bits was requested.
    #[error("bit field of {width} bits exceeds the {max}-bit maximum")]
    FieldTooWide { width: usize, max: usize },

    /// An empty bit field was decoded.
    #[error("empty bit field")]
    EmptyField,

    /// A byte-aligned field whose bit count is not a multiple of 8.
    #[error("bit count {0} is not a whole number of bytes")]
    RaggedBitCount(usize),
}

/// Widest field [`bits_to_int`] will decode.
const MAX_FIELD_BITS: usize = 32;

/// Encode `value` as a fixed-width big-endian bitstring.
///
/// Only the lowest `width` bits of `value` are used; callers are expected
/// to pass values that fit (checked in debug builds).
pub fn int_to_bits(value: u32, width: usize) -> String {
    debug_assert!(width <= MAX_FIELD_BITS);
    debug_assert!(
        width == MAX_FIELD_BITS || value < (1u32 << width),
        "value {value} does not fit in {width} bits"
    );
    (0..width)
        .rev()
        .map(|bit| if value >> bit & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// Decode a fixed-width big-endian bitstring into an unsigned integer.
pub fn bits_to_int(bits: &str) -> Result<u32, BitFieldError> {
    if bits.is_empty() {
        return Err(BitFieldError::EmptyField);
    }
    if bits.len() > MAX_FIELD_BITS {
        return Err(BitFieldError::FieldTooWide {
            width: bits.len(),
            max: MAX_FIELD_BITS,
        });
    }
    let mut value = 0u32;
    for c in bits.chars() {
        value = match c {
            '0' => value << 1,
            '1' => value << 1 | 1,
            other => return Err(BitFieldError::NonBinaryDigit(other)),
        };
    }
    Ok(value)
}

/// Encode payload bytes as a bitstring, 8 bits per byte, MSB first.
pub fn bytes_to_bits(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 8);
    for byte in data {
        out.push_str(&int_to_bits(u32::from(*byte), 8));
    }
    out
}

/// Decode a byte-aligned bitstring back into payload bytes.
pub fn bits_to_bytes(bits: &str) -> Result<Vec<u8>, BitFieldError> {
    let mut out = Vec::with_capacity(bits.len() / 8);
    let mut acc = 0u8;
    let mut filled = 0usize;
    let mut total = 0usize;
    for c in bits.chars() {
        acc = match c {
            '0' => acc << 1,
            '1' => acc << 1 | 1,
            other => return Err(BitFieldError::NonBinaryDigit(other)),
        };
        filled += 1;
        total += 1;
        if filled == 8 {
            out.push(acc);
            acc = 0;
            filled = 0;
        }
    }
    if filled != 0 {
        return Err(BitFieldError::RaggedBitCount(total));
    }
    Ok(out)
}

/// Split `data` into consecutive chunks of at most `max` bytes.
///
/// The final chunk may be shorter; empty input yields no chunks.
pub fn split_chunks(data: &[u8], max: usize) -> Vec<&[u8]> {
    debug_assert!(max > 0);
    data.chunks(max).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
