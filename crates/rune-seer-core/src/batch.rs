//! Per-character analysis of whole inputs.
//!
//! [`analyze`] walks text one code point at a time and decomposes each into
//! annotated bytes, numbering bytes with a single running index so that the
//! records of consecutive characters form one gap-free stream. [`detail`]
//! serves single-character lookups.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decompose::{ByteRecord, decompose_char_at};
use crate::error::{EncodingError, EncodingResult};

/// One decoded character and the bytes that encode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterReport {
    /// The character as a string.
    pub character: String,
    /// Code-point index within the analyzed input.
    pub index: usize,
    /// Byte offset of the character in the caller's input.
    ///
    /// Equal to the first byte's global index for `&str` input. For raw byte
    /// input it points at the original bytes, which differ from the emitted
    /// stream once a malformed sequence has been replaced.
    pub source_offset: usize,
    /// Unicode scalar value.
    pub code_point: u32,
    /// `U+XXXX` notation of `code_point`.
    pub notation: String,
    /// Encoded bytes, leading byte first.
    pub bytes: Vec<ByteRecord>,
    /// Malformed input bytes this U+FFFD stands in for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaced_bytes: Vec<u8>,
}

impl CharacterReport {
    fn new(c: char, index: usize, source_offset: usize, first_global_index: usize) -> Self {
        Self {
            character: c.to_string(),
            index,
            source_offset,
            code_point: u32::from(c),
            notation: notation(u32::from(c)),
            bytes: decompose_char_at(c, first_global_index),
            replaced_bytes: Vec::new(),
        }
    }

    /// Whether this character replaced malformed input.
    pub fn is_replacement(&self) -> bool {
        !self.replaced_bytes.is_empty()
    }
}

/// Result of a single-character lookup.
///
/// Only the first code point of the input is decomposed. When more followed,
/// `truncated` is set and `discarded_chars` says how many were dropped, so
/// callers can tell the user instead of silently ignoring them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetailReport {
    /// The decomposed character.
    #[serde(flatten)]
    pub character: CharacterReport,
    /// Whether the input held more than one code point.
    pub truncated: bool,
    /// Number of code points after the first that were not decomposed.
    pub discarded_chars: usize,
}

/// Format a code point as `U+XXXX` (at least four hex digits).
pub fn notation(code_point: u32) -> String {
    format!("U+{code_point:04X}")
}

/// Running state shared by every character of one call.
#[derive(Default)]
struct Batch {
    reports: Vec<CharacterReport>,
    next_global: usize,
}

impl Batch {
    fn push(&mut self, c: char, source_offset: usize) -> &mut CharacterReport {
        let report = CharacterReport::new(c, self.reports.len(), source_offset, self.next_global);
        self.next_global += report.bytes.len();
        self.reports.push(report);
        let last = self.reports.len() - 1;
        &mut self.reports[last]
    }

    fn finish(self) -> Vec<CharacterReport> {
        self.reports
    }
}

/// Analyze text one code point at a time.
///
/// Empty input yields an empty vector.
#[tracing::instrument(skip(text), fields(text_len = text.len()))]
pub fn analyze(text: &str) -> Vec<CharacterReport> {
    let mut batch = Batch::default();
    for (offset, c) in text.char_indices() {
        batch.push(c, offset);
    }
    let reports = batch.finish();
    tracing::debug!(chars = reports.len(), "analyzed text");
    reports
}

/// Analyze raw bytes, replacing malformed sequences with U+FFFD.
///
/// Each maximal malformed subsequence becomes a single replacement character,
/// matching [`String::from_utf8_lossy`]. The batch always runs to the end.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn analyze_bytes(input: &[u8]) -> Vec<CharacterReport> {
    let mut batch = Batch::default();
    let mut offset = 0;

    for chunk in input.utf8_chunks() {
        let valid = chunk.valid();
        for (i, c) in valid.char_indices() {
            batch.push(c, offset + i);
        }
        offset += valid.len();

        let invalid = chunk.invalid();
        if !invalid.is_empty() {
            tracing::debug!(offset, len = invalid.len(), "replacing malformed UTF-8");
            batch
                .push(char::REPLACEMENT_CHARACTER, offset)
                .replaced_bytes = invalid.to_vec();
            offset += invalid.len();
        }
    }

    batch.finish()
}

/// Decompose the first code point of `text`.
///
/// Returns `None` for empty input.
#[tracing::instrument(skip(text), fields(text_len = text.len()))]
pub fn detail(text: &str) -> Option<DetailReport> {
    let mut chars = text.chars();
    let first = chars.next()?;
    let discarded_chars = chars.count();
    if discarded_chars > 0 {
        tracing::debug!(discarded_chars, "detail lookup truncated to first code point");
    }
    Some(DetailReport {
        character: CharacterReport::new(first, 0, 0, 0),
        truncated: discarded_chars > 0,
        discarded_chars,
    })
}

/// Decompose a single code point given by value.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidCodePoint`] for surrogates and values above
/// U+10FFFF.
pub fn detail_code_point(code_point: u32) -> EncodingResult<DetailReport> {
    let c = char::from_u32(code_point).ok_or(EncodingError::InvalidCodePoint { code_point })?;
    Ok(DetailReport {
        character: CharacterReport::new(c, 0, 0, 0),
        truncated: false,
        discarded_chars: 0,
    })
}

/// Parse `U+1F600`, `u+1f600`, `0x1F600` or decimal `128512`.
///
/// The value is not validated as a scalar value; pass it to
/// [`detail_code_point`] or [`decompose`](crate::decompose::decompose) for that.
pub fn parse_code_point(input: &str) -> Option<u32> {
    let input = input.trim();
    let hex = input
        .strip_prefix("U+")
        .or_else(|| input.strip_prefix("u+"))
        .or_else(|| input.strip_prefix("0x"))
        .or_else(|| input.strip_prefix("0X"));
    match hex {
        Some(digits) if !digits.is_empty() => u32::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None => input.parse().ok(),
    }
}
