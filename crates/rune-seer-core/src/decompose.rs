//! UTF-8 structural decomposition of a single code point.
//!
//! Every byte of an encoded scalar value is split into the fixed bits that
//! UTF-8 reserves for structure (the mask prefix) and the payload bits that
//! carry part of the code point:
//!
//! ```text
//! U+00E9 'é'    11000011 10101001
//!               110xxxxx 10xxxxxx
//!                  00011   101001   -> 00011101001 = 0xE9
//! ```

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{EncodingError, EncodingResult};

/// The structural pattern a UTF-8 byte follows at its position.
///
/// Serializes as the pattern itself (`"110xxxxx"`), which is also what
/// [`Display`](fmt::Display) prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Utf8Mask {
    /// Single-byte sequence (U+0000..=U+007F).
    #[serde(rename = "0xxxxxxx")]
    Ascii,
    /// Leading byte of a 2-byte sequence.
    #[serde(rename = "110xxxxx")]
    Lead2,
    /// Leading byte of a 3-byte sequence.
    #[serde(rename = "1110xxxx")]
    Lead3,
    /// Leading byte of a 4-byte sequence.
    #[serde(rename = "11110xxx")]
    Lead4,
    /// Any byte after the leading one.
    #[serde(rename = "10xxxxxx")]
    Continuation,
}

impl Utf8Mask {
    /// Returns the pattern string, e.g. `"1110xxxx"`.
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Ascii => "0xxxxxxx",
            Self::Lead2 => "110xxxxx",
            Self::Lead3 => "1110xxxx",
            Self::Lead4 => "11110xxx",
            Self::Continuation => "10xxxxxx",
        }
    }

    /// Number of fixed high-order bits.
    pub const fn prefix_len(self) -> usize {
        match self {
            Self::Ascii => 1,
            Self::Continuation => 2,
            Self::Lead2 => 3,
            Self::Lead3 => 4,
            Self::Lead4 => 5,
        }
    }

    /// The fixed bits in place, with every payload bit cleared.
    pub const fn prefix_bits(self) -> u8 {
        match self {
            Self::Ascii => 0b0000_0000,
            Self::Continuation => 0b1000_0000,
            Self::Lead2 => 0b1100_0000,
            Self::Lead3 => 0b1110_0000,
            Self::Lead4 => 0b1111_0000,
        }
    }

    /// Number of payload bits the mask leaves free.
    pub const fn payload_len(self) -> usize {
        8 - self.prefix_len()
    }

    /// The mask for the leading byte of an `len`-byte sequence.
    pub const fn leading(len: usize) -> Option<Self> {
        match len {
            1 => Some(Self::Ascii),
            2 => Some(Self::Lead2),
            3 => Some(Self::Lead3),
            4 => Some(Self::Lead4),
            _ => None,
        }
    }

    /// Sequence length announced by a leading mask; `None` for continuation.
    pub const fn sequence_len(self) -> Option<usize> {
        match self {
            Self::Ascii => Some(1),
            Self::Lead2 => Some(2),
            Self::Lead3 => Some(3),
            Self::Lead4 => Some(4),
            Self::Continuation => None,
        }
    }

    /// Classify a raw byte by its high-order bits.
    ///
    /// Returns `None` for `0xF8..=0xFF`, which no UTF-8 sequence uses.
    pub const fn classify(byte: u8) -> Option<Self> {
        match byte.leading_ones() {
            0 => Some(Self::Ascii),
            1 => Some(Self::Continuation),
            2 => Some(Self::Lead2),
            3 => Some(Self::Lead3),
            4 => Some(Self::Lead4),
            _ => None,
        }
    }
}

impl fmt::Display for Utf8Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// One byte of a code point's UTF-8 encoding, annotated with its structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ByteRecord {
    /// Position of this byte in the whole analyzed stream.
    pub global_byte_index: usize,
    /// Position of this byte within its own sequence (0 = leading byte).
    pub index_within_rune: usize,
    /// The raw byte.
    pub value: u8,
    /// `value` as an 8-digit binary string.
    pub binary: String,
    /// Structural pattern for this byte's position.
    pub mask: Utf8Mask,
    /// Binary digits left once the mask prefix is stripped.
    pub remainder: String,
}

impl ByteRecord {
    fn new(value: u8, mask: Utf8Mask, index_within_rune: usize, global_byte_index: usize) -> Self {
        let binary = format!("{value:08b}");
        let remainder = binary[mask.prefix_len()..].to_string();
        Self {
            global_byte_index,
            index_within_rune,
            value,
            binary,
            mask,
            remainder,
        }
    }

    /// Rebuild the byte from the mask prefix and the remainder digits.
    ///
    /// Returns `None` when the remainder is not exactly as wide as the mask's
    /// payload or contains anything other than `0` and `1`.
    pub fn reassemble(&self) -> Option<u8> {
        let payload = parse_payload(&self.remainder, self.mask.payload_len())?;
        // payload fits in payload_len() < 8 bits
        u8::try_from(payload)
            .ok()
            .map(|bits| self.mask.prefix_bits() | bits)
    }
}

/// Decompose a code point into annotated UTF-8 bytes.
///
/// Global byte indices start at 0; use [`decompose_at`] to continue a stream.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidCodePoint`] for surrogates
/// (U+D800..=U+DFFF) and values above U+10FFFF.
pub fn decompose(code_point: u32) -> EncodingResult<Vec<ByteRecord>> {
    decompose_at(code_point, 0)
}

/// Like [`decompose`], numbering global byte indices from `first_global_index`.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidCodePoint`] when `code_point` is not a
/// Unicode scalar value.
pub fn decompose_at(code_point: u32, first_global_index: usize) -> EncodingResult<Vec<ByteRecord>> {
    let c = char::from_u32(code_point).ok_or(EncodingError::InvalidCodePoint { code_point })?;
    Ok(decompose_char_at(c, first_global_index))
}

/// Decompose a `char`, which is always a valid scalar value.
pub fn decompose_char(c: char) -> Vec<ByteRecord> {
    decompose_char_at(c, 0)
}

/// Decompose a `char`, numbering global byte indices from `first_global_index`.
pub fn decompose_char_at(c: char, first_global_index: usize) -> Vec<ByteRecord> {
    let mut buf = [0u8; 4];
    let encoded = c.encode_utf8(&mut buf).as_bytes();
    let lead = leading_mask(c);

    encoded
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mask = if i == 0 { lead } else { Utf8Mask::Continuation };
            ByteRecord::new(value, mask, i, first_global_index + i)
        })
        .collect()
}

/// Reassemble the code point carried by a decomposed sequence.
///
/// The records must describe exactly one well-formed, shortest-form UTF-8
/// sequence: a leading byte announcing the record count, followed by that many
/// continuation bytes, each record's `value` agreeing with its mask and
/// remainder.
///
/// # Errors
///
/// Returns [`EncodingError::MalformedSequence`] when the structure is broken
/// and [`EncodingError::InvalidCodePoint`] when the payload bits assemble into
/// a surrogate or out-of-range value.
pub fn reconstruct(records: &[ByteRecord]) -> EncodingResult<u32> {
    let (first, rest) = records
        .split_first()
        .ok_or(malformed("empty byte sequence"))?;

    let expected_len = first
        .mask
        .sequence_len()
        .ok_or(malformed("sequence starts with a continuation byte"))?;
    if expected_len != records.len() {
        return Err(malformed("byte count does not match the leading byte"));
    }
    if rest.iter().any(|r| r.mask != Utf8Mask::Continuation) {
        return Err(malformed("expected a continuation byte"));
    }

    let mut code_point = 0u32;
    for record in records {
        let payload = parse_payload(&record.remainder, record.mask.payload_len())
            .ok_or(malformed("remainder does not fit the mask"))?;
        if record.reassemble() != Some(record.value) {
            return Err(malformed("byte value disagrees with mask and remainder"));
        }
        code_point = (code_point << record.mask.payload_len()) | payload;
    }

    let c = char::from_u32(code_point).ok_or(EncodingError::InvalidCodePoint { code_point })?;
    if c.len_utf8() != records.len() {
        return Err(malformed("overlong encoding"));
    }
    Ok(code_point)
}

const fn leading_mask(c: char) -> Utf8Mask {
    match c.len_utf8() {
        1 => Utf8Mask::Ascii,
        2 => Utf8Mask::Lead2,
        3 => Utf8Mask::Lead3,
        _ => Utf8Mask::Lead4,
    }
}

const fn malformed(reason: &'static str) -> EncodingError {
    EncodingError::MalformedSequence { reason }
}

fn parse_payload(digits: &str, width: usize) -> Option<u32> {
    if digits.len() != width || !digits.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    if width == 0 {
        return Some(0);
    }
    u32::from_str_radix(digits, 2).ok()
}
