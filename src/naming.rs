//! Identifier Sanitizing
//!
//! Pure and total. Not collision-free: the split pipeline checks for that.

const PLACEHOLDER: &str = "module";

/// `[A-Za-z_$][A-Za-z0-9_$]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Collapse each run of non-word characters to one `_`, then trim underscores.
fn collapse(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_run = false;
    for c in key.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Binding name a module exports for `key`.
pub fn export_name(key: &str) -> String {
    if is_identifier(key) {
        return key.to_string();
    }
    let name = collapse(key);
    if name.is_empty() {
        return PLACEHOLDER.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{name}");
    }
    name
}

/// Lower-case file stem for `key`'s module.
pub fn file_name_stem(key: &str) -> String {
    let name = collapse(key);
    if name.is_empty() {
        return PLACEHOLDER.to_string();
    }
    name.to_lowercase()
}
