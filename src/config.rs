//! Configuration - Grouping Rules, Exclusions, Required Keys

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Routes keys to a module subdirectory. A key matches when it starts with
/// any prefix or is listed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRule {
    pub dir: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl GroupRule {
    pub fn matches(&self, key: &str) -> bool {
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
            || self.keys.iter().any(|k| k == key)
    }
}

fn default_binding() -> String { "DB".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from("data") }
fn default_backup_suffix() -> String { ".bak".to_string() }
fn default_group() -> String { "misc".to_string() }

fn default_excludes() -> BTreeSet<String> {
    ["SHAPES", "CUPS", "shots"].iter().map(|s| s.to_string()).collect()
}

fn default_groups() -> Vec<GroupRule> {
    vec![
        GroupRule {
            dir: "styles".to_string(),
            prefixes: vec!["styles_".to_string()],
            keys: vec![],
        },
        GroupRule {
            dir: "catalog".to_string(),
            prefixes: vec![],
            keys: ["CLOTHING", "accessories", "actions", "scenes", "effects", "shots", "CUPS", "SHAPES"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
    ]
}

fn default_required_keys() -> Vec<String> {
    [
        "styles_master", "styles_studio", "styles_unique",
        "CLOTHING", "accessories", "actions", "scenes", "effects",
        "shots", "SHAPES", "CUPS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_aggregate() -> PathBuf { PathBuf::from("static/js/data.js") }

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A single relative path segment; anything else could escape the module root.
fn is_plain_segment(dir: &str) -> bool {
    let mut components = Path::new(dir).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitConfig {
    /// Name in `export const <binding> = { ... }`.
    #[serde(default = "default_binding")]
    pub binding: String,
    /// Keys kept inline in the aggregate.
    #[serde(default = "default_excludes")]
    pub excludes: BTreeSet<String>,
    /// Module root; relative paths resolve against the aggregate's directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
    /// Module file extension. Defaults to the aggregate's own.
    #[serde(default)]
    pub extension: Option<String>,
    /// First matching rule wins.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupRule>,
    #[serde(default = "default_group")]
    pub default_group: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            binding: default_binding(),
            excludes: default_excludes(),
            output_dir: default_output_dir(),
            backup_suffix: default_backup_suffix(),
            extension: None,
            groups: default_groups(),
            default_group: default_group(),
        }
    }
}

impl SplitConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binding.is_empty() {
            return Err(ConfigError::Invalid("binding must not be empty".into()));
        }
        if self.backup_suffix.is_empty() {
            return Err(ConfigError::Invalid("backupSuffix must not be empty".into()));
        }
        let dirs = self.groups.iter().map(|g| g.dir.as_str()).chain(Some(self.default_group.as_str()));
        for dir in dirs {
            if !is_plain_segment(dir) {
                return Err(ConfigError::Invalid(format!("group dir `{dir}` must be a single relative segment")));
            }
        }
        Ok(())
    }

    /// Replace the exclusion set; blank items are dropped.
    pub fn with_excludes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excludes = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.excludes.contains(key)
    }

    /// Module subdirectory for `key`.
    pub fn subdirectory(&self, key: &str) -> &str {
        self.groups
            .iter()
            .find(|g| g.matches(key))
            .map_or(self.default_group.as_str(), |g| g.dir.as_str())
    }

    pub fn output_dir_for(&self, aggregate: &Path) -> PathBuf {
        let parent = aggregate.parent().unwrap_or_else(|| Path::new("."));
        parent.join(&self.output_dir)
    }

    pub fn extension_for(&self, aggregate: &Path) -> String {
        self.extension
            .clone()
            .or_else(|| aggregate.extension().map(|e| e.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "js".to_string())
    }

    pub fn backup_path_for(&self, aggregate: &Path) -> PathBuf {
        let mut name = aggregate.file_name().unwrap_or_default().to_os_string();
        name.push(&self.backup_suffix);
        aggregate.with_file_name(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    #[serde(default = "default_aggregate")]
    pub aggregate: PathBuf,
    #[serde(default = "default_binding")]
    pub binding: String,
    #[serde(default = "default_required_keys")]
    pub required_keys: Vec<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            aggregate: default_aggregate(),
            binding: default_binding(),
            required_keys: default_required_keys(),
        }
    }
}

impl CheckConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }
}
