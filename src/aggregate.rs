//! Aggregator Rewriting - Imports Plus Reconstructed Declaration

use regex::Regex;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLine {
    pub name: String,
    pub path: String,
}

impl ImportLine {
    pub fn render(&self) -> String {
        format!("import {{ {} }} from '{}';", self.name, self.path)
    }
}

/// One property of the reconstructed declaration, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// `key: binding` for a module-backed entry.
    Split { key_source: String, binding: String },
    /// `key: value` copied verbatim.
    Inline { key_source: String, value_text: String },
}

impl Member {
    fn render(&self) -> String {
        match self {
            Member::Split { key_source, binding } => format!("  {key_source}: {binding},"),
            Member::Inline { key_source, value_text } => format!("  {key_source}: {value_text},"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorPlan {
    pub banner: String,
    pub binding: String,
    pub imports: Vec<ImportLine>,
    pub members: Vec<Member>,
}

impl AggregatorPlan {
    pub fn new(binding: &str, backup_name: &str) -> Self {
        Self {
            banner: format!("/** Auto-generated aggregator. Original backed up as {backup_name} */"),
            binding: binding.to_string(),
            imports: vec![],
            members: vec![],
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.banner.clone()];
        lines.extend(self.imports.iter().map(ImportLine::render));
        lines.push(String::new());
        lines.push(format!("export const {} = {{", self.binding));
        lines.extend(self.members.iter().map(Member::render));
        lines.push("};".to_string());
        lines.push(String::new());
        lines.join("\n")
    }
}

fn import_regex() -> Option<Regex> {
    Regex::new(r#"import\s*\{\s*([A-Za-z0-9_$]+)\s*\}\s*from\s*(?:'([^']+)'|"([^"]+)")\s*;?"#).ok()
}

/// Every `import { name } from 'path'` in `text`, in order.
pub fn parse_imports(text: &str) -> Vec<ImportLine> {
    let Some(re) = import_regex() else {
        return vec![];
    };
    re.captures_iter(text)
        .filter_map(|c| {
            let path = c.get(2).or_else(|| c.get(3))?;
            Some(ImportLine {
                name: c[1].to_string(),
                path: path.as_str().to_string(),
            })
        })
        .collect()
}

/// `./`-prefixed (or `../`) import specifier for `target`, seen from `from_dir`.
/// Both paths must be absolute or both relative to the same base.
pub fn relative_import(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<Component<'_>> = target.components().filter(|c| *c != Component::CurDir).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec![];
    parts.extend(std::iter::repeat("..".to_string()).take(from.len() - common));
    parts.extend(to[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Lexically resolve `path` against `base`: `.` dropped, `..` pops.
/// No filesystem access, so symlinks are not followed.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in base.join(path).components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
