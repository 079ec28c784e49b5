//! Contract Invariant Tests
//!
//! Split-then-check round trips, idempotence and verbatim values.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use datasplit_core::{
    mask, BackupOutcome, CheckConfig, CollisionKind, FailureClass, IntegrityChecker, SplitConfig,
    SplitError, SplitPipeline, SplitRequest, SourceDocument,
};

const SCENARIO: &str = r#"export const DB = { alpha: {x:1}, "weird-key": [1,2,{y:3}], shots: {z:9} };"#;

fn write_aggregate(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("data.js");
    fs::write(&path, content).unwrap();
    path
}

fn split(path: &Path, config: SplitConfig) -> datasplit_core::SplitReport {
    SplitPipeline::new(config).run(&SplitRequest::new(path)).unwrap()
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn check(path: &Path, required: &[&str]) -> datasplit_core::CheckReport {
    IntegrityChecker::new(CheckConfig {
        aggregate: path.to_path_buf(),
        binding: "DB".to_string(),
        required_keys: required.iter().map(|s| s.to_string()).collect(),
    })
    .run()
}

#[test]
fn invariant_concrete_scenario() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, SCENARIO);

    let report = split(&path, SplitConfig::default());
    assert_eq!(report.modules.len(), 2);
    assert_eq!(report.backup, BackupOutcome::Created);

    let alpha = fs::read_to_string(dir.path().join("data/misc/alpha.js")).unwrap();
    assert_eq!(alpha, "/** Auto-split from data.js */\nexport const alpha = {x:1};\n");
    let weird = fs::read_to_string(dir.path().join("data/misc/weird_key.js")).unwrap();
    assert!(weird.contains("export const weird_key = [1,2,{y:3}];"));

    let rewritten = fs::read_to_string(&path).unwrap();
    let imports: Vec<_> = rewritten.lines().filter(|l| l.starts_with("import")).collect();
    assert_eq!(imports, vec![
        "import { alpha } from './data/misc/alpha.js';",
        "import { weird_key } from './data/misc/weird_key.js';",
    ]);
    assert!(squash(&rewritten).contains(r#"export const DB = { alpha: alpha, "weird-key": weird_key, shots: {z:9}, };"#));
    assert_eq!(fs::read_to_string(dir.path().join("data.js.bak")).unwrap(), SCENARIO);
}

#[test]
fn invariant_split_then_check_is_clean() {
    let dir = TempDir::new().unwrap();
    let source = "// header comment\nexport const DB = {\n  styles_master: { a: 'x, y', b: \"{not}\" },\n  CLOTHING: {\n    // section\n    shirt: \"cotton // not a comment\",\n    coat: `wool, ${'warm'}`,\n  },\n  scenes: [ { s: 1 }, { s: 2 } ],\n  shots: { close: \"close-up\" },\n  SHAPES: compute(1, [2, 3]),\n};\n";
    let path = write_aggregate(&dir, source);
    split(&path, SplitConfig::default());

    let report = check(&path, &["styles_master", "CLOTHING", "scenes", "shots", "SHAPES"]);
    assert!(report.passed, "{}", report.render_text());
    assert_eq!(report.failure, None);
    assert_eq!(report.imports, 3);

    let clothing = report.entry_counts.iter().find(|c| c.name == "CLOTHING").unwrap();
    assert_eq!(clothing.entries, Some(2));
    let scenes = report.entry_counts.iter().find(|c| c.name == "scenes").unwrap();
    assert_eq!(scenes.entries, None);
}

#[test]
fn invariant_values_are_verbatim() {
    let dir = TempDir::new().unwrap();
    let value = "{\n    a: \"x, {y} // not a comment\",\n    /* kept */ b: (n) => ({ n }),\n  }";
    let path = write_aggregate(&dir, &format!("export const DB = {{\n  a: {value},\n}};\n"));
    split(&path, SplitConfig::default());

    let module = fs::read_to_string(dir.path().join("data/misc/a.js")).unwrap();
    assert_eq!(module, format!("/** Auto-split from data.js */\nexport const a = {value};\n"));
}

#[test]
fn invariant_exclude_keeps_literal_text() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, "export const DB = { a: { k: 1 }, b: [ 'x' ], c: 3 };");
    let report = split(&path, SplitConfig::default().with_excludes(["a", "b"]));

    assert_eq!(report.inline_keys, vec!["a", "b"]);
    assert_eq!(report.modules.len(), 1);
    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("  a: { k: 1 },\n  b: [ 'x' ],\n  c: c,\n"));
    assert!(!rewritten.contains("import { a }"));
    assert!(!dir.path().join("data/misc/a.js").exists());
}

#[test]
fn invariant_backup_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, SCENARIO);

    let first = split(&path, SplitConfig::default());
    let backup = fs::read_to_string(&first.backup_path).unwrap();

    // Second run on the same original.
    fs::write(&path, SCENARIO).unwrap();
    let second = split(&path, SplitConfig::default());

    assert_eq!(second.backup, BackupOutcome::AlreadyPresent);
    assert_eq!(fs::read_to_string(&second.backup_path).unwrap(), backup);
    let paths = |r: &datasplit_core::SplitReport| r.modules.iter().map(|m| m.path.clone()).collect::<Vec<_>>();
    assert_eq!(paths(&first), paths(&second));
    assert_eq!(first.plan_hash, second.plan_hash);
}

#[test]
fn invariant_resplit_of_output_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, SCENARIO);
    split(&path, SplitConfig::default());
    let aggregate = fs::read_to_string(&path).unwrap();
    let alpha = fs::read_to_string(dir.path().join("data/misc/alpha.js")).unwrap();

    let report = split(&path, SplitConfig::default());
    assert!(report.modules.is_empty());
    assert_eq!(report.passthrough_keys, vec!["alpha", "weird-key"]);
    assert_eq!(fs::read_to_string(&path).unwrap(), aggregate);
    assert_eq!(fs::read_to_string(dir.path().join("data/misc/alpha.js")).unwrap(), alpha);
    assert_eq!(fs::read_to_string(dir.path().join("data.js.bak")).unwrap(), SCENARIO);
}

#[test]
fn invariant_dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, SCENARIO);

    let report = SplitPipeline::default()
        .run(&SplitRequest { dry_run: true, ..SplitRequest::new(&path) })
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.backup, BackupOutcome::Planned);
    assert_eq!(report.modules.len(), 2);
    assert_eq!(fs::read_to_string(&path).unwrap(), SCENARIO);
    assert!(!dir.path().join("data").exists());
    assert!(!dir.path().join("data.js.bak").exists());
}

#[test]
fn invariant_structural_error_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let broken = "export const DB = { a: 1, b 2 };";
    let path = write_aggregate(&dir, broken);

    let err = SplitPipeline::default().run(&SplitRequest::new(&path)).unwrap_err();
    assert!(err.to_string().contains("expected ':'"));
    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
    assert!(!dir.path().join("data").exists());
    assert!(!dir.path().join("data.js.bak").exists());
}

#[test]
fn invariant_collision_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, "export const DB = { 'x-y': 1, 'x y': 2 };");
    let err = SplitPipeline::default().run(&SplitRequest::new(&path)).unwrap_err();
    assert!(err.to_string().contains("Name collision"));
    assert!(!dir.path().join("data").exists());
}

#[test]
fn invariant_resplit_never_overwrites_existing_module() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, "export const DB = { alpha: {x:1}, shots: {z:9} };");
    split(&path, SplitConfig::default());
    let alpha_path = dir.path().join("data/misc/alpha.js");
    let alpha = fs::read_to_string(&alpha_path).unwrap();

    let edited = fs::read_to_string(&path).unwrap().replace("  alpha: alpha,\n", "  alpha: alpha,\n  Alpha: {y:2},\n");
    fs::write(&path, &edited).unwrap();

    let err = SplitPipeline::default().run(&SplitRequest::new(&path)).unwrap_err();
    assert!(matches!(err, SplitError::NameCollision { kind: CollisionKind::ModulePath, .. }), "{err}");
    assert_eq!(fs::read_to_string(&alpha_path).unwrap(), alpha);
    assert!(alpha.contains("export const alpha = {x:1};"));
    assert_eq!(fs::read_to_string(&path).unwrap(), edited);
}

#[test]
fn invariant_custom_output_dir_imports_relative() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, "export const DB = { styles_x: 1 };");
    let out = dir.path().join("modules");
    SplitPipeline::default()
        .run(&SplitRequest { output_dir: Some(out.clone()), ..SplitRequest::new(&path) })
        .unwrap();

    assert!(out.join("styles/styles_x.js").exists());
    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("import { styles_x } from './modules/styles/styles_x.js';"));
    assert!(check(&path, &["styles_x"]).passed);
}

#[test]
fn invariant_check_detects_removed_module() {
    let dir = TempDir::new().unwrap();
    let path = write_aggregate(&dir, SCENARIO);
    split(&path, SplitConfig::default());
    fs::remove_file(dir.path().join("data/misc/alpha.js")).unwrap();

    let report = check(&path, &["alpha"]);
    assert!(!report.passed);
    assert_eq!(report.failure, Some(FailureClass::MissingModule));
}

#[test]
fn invariant_mask_preserves_length_and_strings() {
    let samples = [
        "a // c\nb",
        "/* x */ 'y' \"// z\" `/* w */`",
        "unterminated /* block",
        "'esc \\' // in' // out",
        "中文 // 注释\n",
    ];
    for src in samples {
        let masked = mask(src);
        assert_eq!(masked.len(), src.len());
        let doc = SourceDocument::new(src);
        for (i, (&m, &r)) in doc.masked().iter().zip(src.as_bytes()).enumerate() {
            assert!(m == r || m == b' ', "byte {i} of {src:?} changed to non-space");
        }
    }
    let doc = SourceDocument::new("'esc \\' // in' // out");
    assert_eq!(doc.masked_str(), "'esc \\' // in'       ");
}
