//! Literal Scanning - Locate, Walk, Count
//!
//! One depth discipline shared by every component: strings are skipped
//! whole, `{}`, `[]` and `()` each keep their own counter.

use regex::Regex;
use thiserror::Error;

use crate::source::{is_quote, skip_string, SourceDocument};

/// Failure to locate or fully parse the expected literal shape.
/// Every variant carries the byte offset where detection failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructuralError {
    #[error("declaration `export const {binding} = {{` not found")]
    DeclarationNotFound { binding: String, offset: usize },

    #[error("unbalanced braces: literal opened at byte {open} never closes")]
    UnbalancedBraces { open: usize, offset: usize },

    #[error("expected property key at byte {offset}")]
    ExpectedKey { offset: usize },

    #[error("unterminated quoted key starting at byte {offset}")]
    UnterminatedKey { offset: usize },

    #[error("expected ':' at byte {offset}")]
    ExpectedColon { offset: usize },

    #[error("expected value expression at byte {offset}")]
    ExpectedValue { offset: usize },

    #[error("declaration opened at byte {offset} holds no properties")]
    NoEntries { offset: usize },
}

impl StructuralError {
    pub fn offset(&self) -> usize {
        match self {
            Self::DeclarationNotFound { offset, .. }
            | Self::UnbalancedBraces { offset, .. }
            | Self::ExpectedKey { offset }
            | Self::UnterminatedKey { offset }
            | Self::ExpectedColon { offset }
            | Self::ExpectedValue { offset }
            | Self::NoEntries { offset } => *offset,
        }
    }
}

/// Inclusive `{`..`}` byte positions of one object literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralRange {
    pub open: usize,
    pub close: usize,
}

impl LiteralRange {
    /// Bytes strictly between the braces.
    pub fn interior(&self) -> (usize, usize) {
        (self.open + 1, self.close)
    }
}

/// Three independent bracket counters. Closers never drive a counter below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthTracker {
    curly: usize,
    square: usize,
    paren: usize,
}

impl DepthTracker {
    /// Apply one byte; returns true if it was a bracket.
    pub fn observe(&mut self, b: u8) -> bool {
        match b {
            b'{' => self.curly += 1,
            b'}' => self.curly = self.curly.saturating_sub(1),
            b'[' => self.square += 1,
            b']' => self.square = self.square.saturating_sub(1),
            b'(' => self.paren += 1,
            b')' => self.paren = self.paren.saturating_sub(1),
            _ => return false,
        }
        true
    }

    pub fn is_top(&self) -> bool {
        self.curly == 0 && self.square == 0 && self.paren == 0
    }
}

/// Non-bracket bytes of a span that sit outside strings at depth zero.
pub struct TopLevelBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
    depth: DepthTracker,
}

impl<'a> TopLevelBytes<'a> {
    pub fn new(doc: &'a SourceDocument, start: usize, end: usize) -> Self {
        Self {
            bytes: doc.masked(),
            pos: start,
            end: end.min(doc.len()),
            depth: DepthTracker::default(),
        }
    }
}

impl Iterator for TopLevelBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let at = self.pos;
            let b = self.bytes[at];
            if is_quote(b) {
                self.pos = skip_string(self.bytes, at).min(self.end);
                continue;
            }
            self.pos += 1;
            if self.depth.observe(b) {
                continue;
            }
            if self.depth.is_top() {
                return Some((at, b));
            }
        }
        None
    }
}

/// First top-level occurrence of `needle` in `start..end`.
pub fn find_top_level(doc: &SourceDocument, start: usize, end: usize, needle: u8) -> Option<usize> {
    TopLevelBytes::new(doc, start, end)
        .find(|&(_, b)| b == needle)
        .map(|(i, _)| i)
}

/// Count of top-level `needle` bytes inside a literal's braces.
pub fn count_top_level(doc: &SourceDocument, range: &LiteralRange, needle: u8) -> usize {
    let (start, end) = range.interior();
    TopLevelBytes::new(doc, start, end)
        .filter(|&(_, b)| b == needle)
        .count()
}

fn binding_regex(binding: &str) -> Option<Regex> {
    Regex::new(&format!(r"export\s+const\s+{}\s*=\s*", regex::escape(binding))).ok()
}

/// Offset of the first byte of the value bound by `export const <binding> =`.
/// Matching runs over the masked text, so commented-out declarations are skipped.
pub fn find_binding_value(doc: &SourceDocument, binding: &str) -> Option<usize> {
    let re = binding_regex(binding)?;
    let m = re.find(doc.masked_str())?;
    (m.end() < doc.len()).then_some(m.end())
}

/// Brace matching `open`: the first position where curly depth returns to zero.
pub fn match_brace(doc: &SourceDocument, open: usize) -> Result<LiteralRange, StructuralError> {
    let bytes = doc.masked();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        if is_quote(b) {
            i = skip_string(bytes, i);
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(LiteralRange { open, close: i });
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(StructuralError::UnbalancedBraces { open, offset: bytes.len() })
}

/// Range of the object literal assigned by `export const <binding> = { ... }`.
pub fn locate_declaration(doc: &SourceDocument, binding: &str) -> Result<LiteralRange, StructuralError> {
    let open = find_binding_value(doc, binding)
        .filter(|&i| doc.masked()[i] == b'{')
        .ok_or_else(|| StructuralError::DeclarationNotFound {
            binding: binding.to_string(),
            offset: doc.len(),
        })?;
    match_brace(doc, open)
}

/// Heuristic entry count for the literal bound to `name`: top-level colons
/// inside its braces. `None` when the value is not an object literal.
pub fn estimate_entries(doc: &SourceDocument, name: &str) -> Option<usize> {
    let start = find_binding_value(doc, name)?;
    if doc.masked()[start] != b'{' {
        return None;
    }
    let range = match_brace(doc, start).ok()?;
    Some(count_top_level(doc, &range, b':'))
}
