//! Split Pipeline - Single Entry Point
//!
//! Plan first, write last. A source that does not parse completely is
//! never partially split, and the aggregate is always the final write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregate::{parse_imports, relative_import, resolve_path, AggregatorPlan, ImportLine, Member};
use crate::backup::{BackupGuard, BackupOutcome};
use crate::config::{ConfigError, SplitConfig};
use crate::emit::{self, fs_error, ModuleFile};
use crate::entries::split_entries;
use crate::hashing::{compute_plan_hash, fingerprint};
use crate::scan::{locate_declaration, StructuralError};
use crate::source::SourceDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionKind {
    ExportName,
    ModulePath,
    DeclarationBinding,
}

impl fmt::Display for CollisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExportName => "export name",
            Self::ModulePath => "module path",
            Self::DeclarationBinding => "the declaration binding",
        })
    }
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Structural error at byte {}: {0}", .0.offset())]
    Structural(#[from] StructuralError),

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Name collision: keys `{first}` and `{second}` both map to {kind} `{name}`")]
    NameCollision {
        kind: CollisionKind,
        name: String,
        first: String,
        second: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub aggregate: PathBuf,
    /// Overrides the configured module root.
    pub output_dir: Option<PathBuf>,
    pub dry_run: bool,
}

impl SplitRequest {
    pub fn new(aggregate: impl Into<PathBuf>) -> Self {
        Self {
            aggregate: aggregate.into(),
            output_dir: None,
            dry_run: false,
        }
    }
}

/// A module to write, with its rendered content.
#[derive(Debug, Clone)]
pub struct PlannedModule {
    pub module: ModuleFile,
    pub import: ImportLine,
    pub content: String,
}

/// Everything a split will write, computed without touching the filesystem.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    pub aggregate: PathBuf,
    pub output_dir: PathBuf,
    pub original: String,
    pub modules: Vec<PlannedModule>,
    pub aggregator: AggregatorPlan,
    pub inline_keys: Vec<String>,
    pub passthrough_keys: Vec<String>,
}

impl SplitPlan {
    pub fn rendered_aggregate(&self) -> String {
        self.aggregator.render()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub key: String,
    pub export_name: String,
    pub path: PathBuf,
    pub import_path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitReport {
    pub aggregate: PathBuf,
    pub output_dir: PathBuf,
    pub backup_path: PathBuf,
    pub backup: BackupOutcome,
    pub modules: Vec<ModuleRecord>,
    pub inline_keys: Vec<String>,
    pub passthrough_keys: Vec<String>,
    pub dry_run: bool,
    pub plan_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Tracks which key first claimed each generated name.
#[derive(Default)]
struct NameClaims {
    export_names: HashMap<String, String>,
    paths: HashMap<PathBuf, String>,
}

impl NameClaims {
    fn claim_export(&mut self, name: &str, key: &str) -> Result<(), SplitError> {
        if let Some(first) = self.export_names.get(name) {
            return Err(SplitError::NameCollision {
                kind: CollisionKind::ExportName,
                name: name.to_string(),
                first: first.clone(),
                second: key.to_string(),
            });
        }
        self.export_names.insert(name.to_string(), key.to_string());
        Ok(())
    }

    fn claim_path(&mut self, path: &Path, key: &str) -> Result<(), SplitError> {
        if let Some(first) = self.paths.get(path) {
            return Err(SplitError::NameCollision {
                kind: CollisionKind::ModulePath,
                name: path.display().to_string(),
                first: first.clone(),
                second: key.to_string(),
            });
        }
        self.paths.insert(path.to_path_buf(), key.to_string());
        Ok(())
    }
}

/// The split pipeline - mask, locate, split, plan, commit
pub struct SplitPipeline {
    config: SplitConfig,
}

impl SplitPipeline {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Read the aggregate and plan the split.
    pub fn plan(&self, request: &SplitRequest) -> Result<SplitPlan, SplitError> {
        self.config.validate()?;
        let aggregate = std::path::absolute(&request.aggregate).map_err(fs_error(&request.aggregate))?;
        let output_dir = match &request.output_dir {
            Some(dir) => std::path::absolute(dir).map_err(fs_error(dir))?,
            None => self.config.output_dir_for(&aggregate),
        };
        let source = fs::read_to_string(&aggregate).map_err(fs_error(&aggregate))?;
        self.plan_source(source, &aggregate, &output_dir)
    }

    /// Plan a split of `source` as if it lived at `aggregate`.
    pub fn plan_source(&self, source: String, aggregate: &Path, output_dir: &Path) -> Result<SplitPlan, SplitError> {
        let doc = SourceDocument::new(source);
        let binding = self.config.binding.as_str();
        let range = locate_declaration(&doc, binding)?;
        let entries = split_entries(&doc, &range)?;
        if entries.is_empty() {
            return Err(StructuralError::NoEntries { offset: range.open }.into());
        }
        tracing::info!("found {} top-level entries in `{}`", entries.len(), binding);

        let aggregate_dir = aggregate.parent().unwrap_or_else(|| Path::new("."));
        let origin = aggregate.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let backup_path = self.config.backup_path_for(aggregate);
        let backup_name = backup_path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let extension = self.config.extension_for(aggregate);
        let existing: HashMap<String, ImportLine> = parse_imports(doc.masked_str())
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();

        let mut aggregator = AggregatorPlan::new(binding, &backup_name);
        let mut claims = NameClaims::default();
        let mut modules = vec![];
        let mut inline_keys = vec![];
        let mut passthrough_keys = vec![];

        for entry in &entries {
            // Already split by an earlier run: keep the import, leave the module alone.
            if let Some(import) = existing.get(&entry.value_text) {
                if !aggregator.imports.contains(import) {
                    claims.claim_export(&import.name, &entry.key)?;
                    claims.claim_path(&resolve_path(aggregate_dir, Path::new(&import.path)), &entry.key)?;
                    aggregator.imports.push(import.clone());
                }
                aggregator.members.push(Member::Split {
                    key_source: entry.key_source.clone(),
                    binding: import.name.clone(),
                });
                passthrough_keys.push(entry.key.clone());
                continue;
            }

            if self.config.is_excluded(&entry.key) {
                aggregator.members.push(Member::Inline {
                    key_source: entry.key_source.clone(),
                    value_text: entry.value_text.clone(),
                });
                inline_keys.push(entry.key.clone());
                continue;
            }

            let module = ModuleFile::new(entry, &self.config, output_dir, &extension);
            if module.export_name == binding {
                return Err(SplitError::NameCollision {
                    kind: CollisionKind::DeclarationBinding,
                    name: module.export_name,
                    first: binding.to_string(),
                    second: entry.key.clone(),
                });
            }
            claims.claim_export(&module.export_name, &entry.key)?;
            claims.claim_path(&resolve_path(Path::new(""), &module.path), &entry.key)?;

            let import = ImportLine {
                name: module.export_name.clone(),
                path: relative_import(aggregate_dir, &module.path),
            };
            aggregator.imports.push(import.clone());
            aggregator.members.push(Member::Split {
                key_source: entry.key_source.clone(),
                binding: module.export_name.clone(),
            });
            let content = module.render(&origin);
            modules.push(PlannedModule { module, import, content });
        }

        tracing::debug!(
            "planned {} modules, {} inline, {} already split",
            modules.len(),
            inline_keys.len(),
            passthrough_keys.len()
        );

        Ok(SplitPlan {
            aggregate: aggregate.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            original: doc.raw().to_string(),
            modules,
            aggregator,
            inline_keys,
            passthrough_keys,
        })
    }

    /// Plan and, unless dry-running, write modules, backup, then the aggregate.
    pub fn run(&self, request: &SplitRequest) -> Result<SplitReport, SplitError> {
        let plan = self.plan(request)?;
        let backup = BackupGuard::new(self.config.backup_path_for(&plan.aggregate));

        let outcome = if request.dry_run {
            tracing::info!("dry run: {} module writes planned, nothing written", plan.modules.len());
            backup.plan()
        } else {
            self.commit(&plan, &backup)?
        };

        self.report(&plan, &backup, outcome, request.dry_run)
    }

    fn commit(&self, plan: &SplitPlan, backup: &BackupGuard) -> Result<BackupOutcome, SplitError> {
        emit::write_all(
            plan.modules
                .iter()
                .map(|m| (m.module.path.as_path(), m.content.as_str())),
        )?;
        tracing::info!("wrote {} modules under {}", plan.modules.len(), plan.output_dir.display());

        let outcome = backup.preserve(&plan.original)?;

        let rendered = plan.rendered_aggregate();
        emit::stage(&plan.aggregate, &rendered)?.commit()?;
        tracing::info!("rewrote aggregate {}", plan.aggregate.display());
        Ok(outcome)
    }

    fn report(
        &self,
        plan: &SplitPlan,
        backup: &BackupGuard,
        outcome: BackupOutcome,
        dry_run: bool,
    ) -> Result<SplitReport, SplitError> {
        let modules: Vec<ModuleRecord> = plan
            .modules
            .iter()
            .map(|m| ModuleRecord {
                key: m.module.key.clone(),
                export_name: m.module.export_name.clone(),
                path: m.module.path.clone(),
                import_path: m.import.path.clone(),
                sha256: fingerprint(&m.content),
            })
            .collect();

        Ok(SplitReport {
            aggregate: plan.aggregate.clone(),
            output_dir: plan.output_dir.clone(),
            backup_path: backup.path().to_path_buf(),
            backup: outcome,
            plan_hash: compute_plan_hash(&modules)?,
            modules,
            inline_keys: plan.inline_keys.clone(),
            passthrough_keys: plan.passthrough_keys.clone(),
            dry_run,
            created_at: Utc::now(),
        })
    }
}

impl Default for SplitPipeline {
    fn default() -> Self {
        Self::new(SplitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(src: &str, config: SplitConfig) -> Result<SplitPlan, SplitError> {
        SplitPipeline::new(config).plan_source(
            src.to_string(),
            Path::new("/app/static/js/data.js"),
            Path::new("/app/static/js/data"),
        )
    }

    #[test]
    fn test_plan_concrete_scenario() {
        let p = plan(
            r#"export const DB = { alpha: {x:1}, "weird-key": [1,2,{y:3}], shots: {z:9} };"#,
            SplitConfig::default(),
        )
        .unwrap();

        let paths: Vec<_> = p.modules.iter().map(|m| m.import.path.as_str()).collect();
        assert_eq!(paths, vec!["./data/misc/alpha.js", "./data/misc/weird_key.js"]);
        assert_eq!(p.inline_keys, vec!["shots".to_string()]);
        assert!(p.rendered_aggregate().contains(
            "export const DB = {\n  alpha: alpha,\n  \"weird-key\": weird_key,\n  shots: {z:9},\n};\n"
        ));
    }

    #[test]
    fn test_export_name_collision_fails() {
        let err = plan("export const DB = { 'a-b': 1, 'a b': 2 };", SplitConfig::default()).unwrap_err();
        match err {
            SplitError::NameCollision { kind, name, first, second } => {
                assert_eq!(kind, CollisionKind::ExportName);
                assert_eq!(name, "a_b");
                assert_eq!(first, "a-b");
                assert_eq!(second, "a b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_module_path_collision_fails() {
        let err = plan("export const DB = { Foo: 1, foo: 2 };", SplitConfig::default()).unwrap_err();
        assert!(matches!(err, SplitError::NameCollision { kind: CollisionKind::ModulePath, .. }));
    }

    #[test]
    fn test_binding_collision_fails() {
        let err = plan("export const DB = { DB: 1 };", SplitConfig::default()).unwrap_err();
        assert!(matches!(err, SplitError::NameCollision { kind: CollisionKind::DeclarationBinding, .. }));
    }

    #[test]
    fn test_excluded_collisions_ignored() {
        let config = SplitConfig::default().with_excludes(["a b"]);
        assert!(plan("export const DB = { 'a-b': 1, 'a b': 2 };", config).is_ok());
    }

    #[test]
    fn test_empty_declaration_fails() {
        let err = plan("export const DB = {};", SplitConfig::default()).unwrap_err();
        assert!(matches!(err, SplitError::Structural(StructuralError::NoEntries { offset: 18 })));
    }

    #[test]
    fn test_structural_error_reports_offset() {
        let err = plan("export const DB = { a 1 };", SplitConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "Structural error at byte 22: expected ':' at byte 22");
    }

    #[test]
    fn test_already_split_entries_pass_through() {
        let src = "/** gen */\nimport { alpha } from './data/misc/alpha.js';\n\nexport const DB = {\n  alpha: alpha,\n  beta: [1],\n};\n";
        let p = plan(src, SplitConfig::default()).unwrap();
        assert_eq!(p.passthrough_keys, vec!["alpha".to_string()]);
        assert_eq!(p.modules.len(), 1);
        assert_eq!(p.modules[0].module.key, "beta");
        assert_eq!(p.aggregator.imports[0].path, "./data/misc/alpha.js");
    }

    #[test]
    fn test_new_module_cannot_reuse_passthrough_path() {
        let src = "import { alpha } from './data/misc/alpha.js';\nexport const DB = {\n  alpha: alpha,\n  Alpha: {y:2},\n};\n";
        let err = plan(src, SplitConfig::default()).unwrap_err();
        match err {
            SplitError::NameCollision { kind, first, second, .. } => {
                assert_eq!(kind, CollisionKind::ModulePath);
                assert_eq!(first, "alpha");
                assert_eq!(second, "Alpha");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
