//! Half-open codepoint spans and text indexing
//!
//! All offsets exposed by this crate count Unicode scalar values (codepoints),
//! never bytes. `TextIndex` owns the mapping between the two so that regex
//! matches (byte offsets) can be converted once at the recognizer boundary and
//! rewriting can slice the original string without re-scanning it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open interval `[start, end)` over codepoint offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of codepoints covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the two spans share at least one codepoint
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True if `other` lies entirely inside `self`
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both
    pub fn union(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Codepoints between the end of `self` and the start of `other`,
    /// or `None` when `other` does not start after `self`
    pub fn gap_to(&self, other: &Span) -> Option<usize> {
        other.start.checked_sub(self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Codepoint-addressable view of a document
///
/// Built once per document. `byte_offsets[i]` is the byte offset of
/// codepoint `i`; the final entry is `text.len()`.
#[derive(Debug, Clone)]
pub struct TextIndex<'a> {
    text: &'a str,
    byte_offsets: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        byte_offsets.push(text.len());
        Self { text, byte_offsets }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Length of the text in codepoints
    pub fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    /// Byte offset of a codepoint offset (clamped to the text end)
    pub fn byte_at(&self, char_offset: usize) -> usize {
        let idx = char_offset.min(self.char_len());
        self.byte_offsets[idx]
    }

    /// Codepoint offset of a byte offset that lies on a char boundary.
    ///
    /// Offsets inside a multi-byte character resolve to the character
    /// that contains them.
    pub fn char_at(&self, byte_offset: usize) -> usize {
        match self.byte_offsets.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Convert a byte range (e.g. a regex match) to a codepoint span
    pub fn span_from_bytes(&self, start: usize, end: usize) -> Span {
        Span::new(self.char_at(start), self.char_at(end))
    }

    /// Byte range for a codepoint span
    pub fn byte_range(&self, span: Span) -> std::ops::Range<usize> {
        self.byte_at(span.start)..self.byte_at(span.end)
    }

    /// True if the span is non-empty and inside the text
    pub fn is_valid(&self, span: Span) -> bool {
        span.start < span.end && span.end <= self.char_len()
    }

    /// Slice the original text by a codepoint span
    pub fn slice(&self, span: Span) -> &'a str {
        let range = self.byte_range(span);
        &self.text[range]
    }
}
