//! Entry Splitting - Top-Level Properties of One Literal
//!
//! Values are sliced from the raw text, never re-encoded.

use serde::Serialize;

use crate::naming::is_identifier;
use crate::scan::{find_top_level, LiteralRange, StructuralError};
use crate::source::{is_escaped, SourceDocument};

/// One `key: value` pair at the first nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Decoded property name, quotes stripped.
    pub key: String,
    /// Key exactly as spelled in the source, quotes included.
    pub key_source: String,
    pub is_identifier_key: bool,
    /// Verbatim value expression, trimmed.
    pub value_text: String,
    pub order: usize,
    /// Byte offset of the key.
    pub offset: usize,
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_ws(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Last non-whitespace position + 1 in the masked span; trailing comments trim away.
fn trim_end(bytes: &[u8], start: usize, mut end: usize) -> usize {
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    end
}

/// Read a quoted or bare key at `i`. Returns (decoded, source spelling, next offset).
fn read_key(doc: &SourceDocument, i: usize, end: usize) -> Result<(String, String, usize), StructuralError> {
    let bytes = doc.masked();
    let b = bytes[i];

    if b == b'\'' || b == b'"' {
        let mut k = i + 1;
        while k < end {
            if bytes[k] == b && !is_escaped(bytes, k) {
                let decoded = doc.slice(i + 1, k).to_string();
                let source = doc.slice(i, k + 1).to_string();
                return Ok((decoded, source, k + 1));
            }
            k += 1;
        }
        return Err(StructuralError::UnterminatedKey { offset: i });
    }

    let mut k = i;
    while k < end && is_word(bytes[k]) {
        k += 1;
    }
    if k == i {
        return Err(StructuralError::ExpectedKey { offset: i });
    }
    let key = doc.slice(i, k).to_string();
    Ok((key.clone(), key, k))
}

/// Ordered entries between the braces of `range`.
pub fn split_entries(doc: &SourceDocument, range: &LiteralRange) -> Result<Vec<Entry>, StructuralError> {
    let bytes = doc.masked();
    let (mut i, end) = range.interior();
    let mut entries = Vec::new();

    loop {
        i = skip_ws(bytes, i, end);
        if i >= end {
            break;
        }

        let offset = i;
        let (key, key_source, after_key) = read_key(doc, i, end)?;

        let colon = skip_ws(bytes, after_key, end);
        if colon >= end || bytes[colon] != b':' {
            return Err(StructuralError::ExpectedColon { offset: colon });
        }

        let value_start = skip_ws(bytes, colon + 1, end);
        let separator = find_top_level(doc, value_start, end, b',');
        let value_end = trim_end(bytes, value_start, separator.unwrap_or(end));
        if value_end == value_start {
            return Err(StructuralError::ExpectedValue { offset: value_start });
        }

        entries.push(Entry {
            is_identifier_key: is_identifier(&key),
            key,
            key_source,
            value_text: doc.slice(value_start, value_end).to_string(),
            order: entries.len(),
            offset,
        });

        i = separator.map_or(end, |s| s + 1);
    }

    Ok(entries)
}
