//! Source Masking - Comment-Blind Shadow Text
//!
//! Every scanner in the crate works on the masked shadow, never on raw text.
//! Offsets are shared between the two: index `i` is valid in both.

/// Raw source paired with its masked shadow.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    raw: String,
    masked: Vec<u8>,
}

impl SourceDocument {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let masked = mask(&raw);
        Self { raw, masked }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn masked(&self) -> &[u8] {
        &self.masked
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Masked text as a string. Comment bytes are ASCII spaces, so every
    /// multi-byte character either survives whole or is blanked whole.
    pub fn masked_str(&self) -> &str {
        std::str::from_utf8(&self.masked).unwrap_or_default()
    }

    /// Raw slice for a byte span. Callers pass spans bounded by ASCII bytes.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.raw.get(start..end).unwrap_or_default()
    }
}

/// True when the byte at `index` is preceded by an odd run of backslashes.
pub fn is_escaped(bytes: &[u8], index: usize) -> bool {
    let run = bytes[..index]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    run % 2 == 1
}

pub fn is_quote(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'`')
}

/// Index just past the string literal opened at `open`, or `bytes.len()` if
/// the literal never closes. Template interpolation is not interpreted.
pub fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote && !is_escaped(bytes, i) {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Blank `//` and `/* */` comments to spaces; copy everything else,
/// string and template literals included, unchanged.
pub fn mask(src: &str) -> Vec<u8> {
    let bytes = src.as_bytes();
    let mut out = bytes.to_vec();
    let n = bytes.len();
    let mut i = 0;

    while i < n {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();

        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }

        match (c, next) {
            (b'/', Some(b'/')) => {
                while i < n && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                // An unterminated block comment runs to end of input.
                while i < n && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    out[i] = b' ';
                    i += 1;
                }
                if i < n {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                }
            }
            _ => i += 1,
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masked(src: &str) -> String {
        String::from_utf8(mask(src)).unwrap()
    }

    #[test]
    fn test_line_comment_blanked() {
        assert_eq!(masked("a: 1, // note\nb: 2"), "a: 1,        \nb: 2");
    }

    #[test]
    fn test_block_comment_blanked() {
        assert_eq!(masked("x/* {y} */z"), "x         z");
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        assert_eq!(masked("a /* open"), "a        ");
    }

    #[test]
    fn test_strings_survive() {
        let src = r#"{ a: "x, {y} // not a comment", b: '/* nor this */' }"#;
        assert_eq!(masked(src), src);
    }

    #[test]
    fn test_template_literal_survives() {
        let src = "`line // ${x} /* y */`";
        assert_eq!(masked(src), src);
    }

    #[test]
    fn test_escaped_quote_keeps_string_open() {
        let src = r#""a \" // still string" // gone"#;
        assert_eq!(masked(src), r#""a \" // still string"        "#);
    }

    #[test]
    fn test_even_backslash_run_closes_string() {
        let src = r#""a\\" // gone"#;
        assert_eq!(masked(src), r#""a\\"        "#);
    }

    #[test]
    fn test_multibyte_comment_keeps_length() {
        let src = "a // 城市与日常\nb";
        let out = mask(src);
        assert_eq!(out.len(), src.len());
        assert!(String::from_utf8(out).is_ok());
    }

    #[test]
    fn test_is_escaped_counts_run() {
        let b = br#"\\\""#;
        assert!(is_escaped(b, 3));
        assert!(!is_escaped(b"\\\\\"", 2));
    }
}
