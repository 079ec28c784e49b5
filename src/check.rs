//! Integrity Checking - Ordered Rules Over a Split Aggregate
//!
//! Rules run in a fixed order. The first rule that finds problems stops
//! the run and reports every offending item it found. Entry counts are a
//! diagnostic signal only and never fail a check.

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::{parse_imports, resolve_path, ImportLine};
use crate::config::CheckConfig;
use crate::scan::{estimate_entries, locate_declaration, DepthTracker, LiteralRange, StructuralError};
use crate::source::{is_quote, skip_string, SourceDocument};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Failure,
    Warning,
    Info,
}

/// Hard failure classes, in check order. Each has its own exit code.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    AggregateUnreadable,
    MissingModule,
    ExportMismatch,
    DeclarationNotFound,
    MissingRequiredKeys,
    UnbalancedBraces,
}

impl FailureClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::AggregateUnreadable => 1,
            Self::MissingModule => 2,
            Self::ExportMismatch => 3,
            Self::DeclarationNotFound => 4,
            Self::MissingRequiredKeys => 5,
            Self::UnbalancedBraces => 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<FailureClass>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl Finding {
    fn info(rule: &str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, rule: rule.to_string(), class: None, message: message.into(), items: vec![] }
    }

    fn warning(rule: &str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, rule: rule.to_string(), class: None, message: message.into(), items: vec![] }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCount {
    pub name: String,
    /// `None` when the module value is not an object literal.
    pub entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub aggregate: PathBuf,
    pub passed: bool,
    pub failure: Option<FailureClass>,
    pub findings: Vec<Finding>,
    pub imports: usize,
    pub present_keys: Vec<String>,
    pub entry_counts: Vec<EntryCount>,
}

impl CheckReport {
    fn new(aggregate: &Path) -> Self {
        Self {
            aggregate: aggregate.to_path_buf(),
            passed: false,
            failure: None,
            findings: vec![],
            imports: 0,
            present_keys: vec![],
            entry_counts: vec![],
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.failure.map_or(0, FailureClass::exit_code)
    }

    /// Human-readable status lines.
    pub fn render_text(&self) -> String {
        let mut out = String::from("=== Aggregate Integrity Check ===\n");
        for f in &self.findings {
            let tag = match f.severity {
                Severity::Failure => "\nFAIL:",
                Severity::Warning => "WARN:",
                Severity::Info => "OK:",
            };
            out.push_str(&format!("{tag} {}\n", f.message));
            for item in &f.items {
                out.push_str(&format!("  - {item}\n"));
            }
        }
        if self.passed {
            if !self.entry_counts.is_empty() {
                out.push_str("\n--- Heuristic module entry counts (object literals only) ---\n");
                for c in &self.entry_counts {
                    match c.entries {
                        Some(n) => out.push_str(&format!("{:16} : ~{n} entries\n", c.name)),
                        None => out.push_str(&format!("{:16} : (non-object or couldn't estimate)\n", c.name)),
                    }
                }
                out.push_str("-----------------------------------------------------------\n");
            }
            out.push_str("\nIntegrity check passed.\n");
        }
        out
    }
}

/// A rule's failure: its class plus everything offending it found.
#[derive(Debug, Clone)]
pub struct RuleViolation {
    pub class: FailureClass,
    pub message: String,
    pub items: Vec<String>,
}

/// An imported module as found on disk.
pub struct LoadedModule {
    pub import: ImportLine,
    pub path: PathBuf,
    pub doc: Option<SourceDocument>,
}

/// Shared state the rules read and, for the declaration, fill in.
pub struct CheckContext<'a> {
    pub config: &'a CheckConfig,
    pub doc: SourceDocument,
    pub modules: Vec<LoadedModule>,
    pub range: Option<LiteralRange>,
}

/// Integrity rule trait - Ok carries the success message
pub trait IntegrityRule {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &mut CheckContext<'_>) -> Result<String, RuleViolation>;
}

// --- Concrete Rules ---

pub struct ModulesExistRule;

impl IntegrityRule for ModulesExistRule {
    fn name(&self) -> &'static str { "modules_exist" }

    fn check(&self, ctx: &mut CheckContext<'_>) -> Result<String, RuleViolation> {
        let missing: Vec<String> = ctx
            .modules
            .iter()
            .filter(|m| m.doc.is_none())
            .map(|m| format!("import {{{}}} from '{}'  => not found at: {}", m.import.name, m.import.path, m.path.display()))
            .collect();
        if missing.is_empty() {
            Ok("All imported module files exist".to_string())
        } else {
            Err(RuleViolation {
                class: FailureClass::MissingModule,
                message: "Missing module files:".to_string(),
                items: missing,
            })
        }
    }
}

pub struct ExportNamesRule;

impl IntegrityRule for ExportNamesRule {
    fn name(&self) -> &'static str { "export_names" }

    fn check(&self, ctx: &mut CheckContext<'_>) -> Result<String, RuleViolation> {
        let mut mismatched = vec![];
        for m in &ctx.modules {
            let Some(doc) = &m.doc else { continue };
            let re = Regex::new(&format!(r"export\s+const\s+{}\s*=", regex::escape(&m.import.name)));
            let found = re.map(|re| re.is_match(doc.masked_str())).unwrap_or(false);
            if !found {
                mismatched.push(format!("{}  (expected: export const {} = ...)", m.path.display(), m.import.name));
            }
        }
        if mismatched.is_empty() {
            Ok("All modules export expected const names".to_string())
        } else {
            Err(RuleViolation {
                class: FailureClass::ExportMismatch,
                message: "Export name mismatch (module exists but doesn't export expected const):".to_string(),
                items: mismatched,
            })
        }
    }
}

pub struct DeclarationRule;

impl IntegrityRule for DeclarationRule {
    fn name(&self) -> &'static str { "declaration" }

    fn check(&self, ctx: &mut CheckContext<'_>) -> Result<String, RuleViolation> {
        let binding = &ctx.config.binding;
        match locate_declaration(&ctx.doc, binding) {
            Ok(range) => {
                ctx.range = Some(range);
                Ok(format!("Found `export const {binding} = {{ ... }}`"))
            }
            Err(e @ StructuralError::UnbalancedBraces { .. }) => Err(RuleViolation {
                class: FailureClass::UnbalancedBraces,
                message: format!("Declaration `{binding}` is not balanced:"),
                items: vec![e.to_string()],
            }),
            Err(e) => Err(RuleViolation {
                class: FailureClass::DeclarationNotFound,
                message: format!("Cannot find `export const {binding} = {{ ... }};`"),
                items: vec![format!("{e} (searched to byte {})", e.offset())],
            }),
        }
    }
}

pub struct RequiredKeysRule;

impl IntegrityRule for RequiredKeysRule {
    fn name(&self) -> &'static str { "required_keys" }

    fn check(&self, ctx: &mut CheckContext<'_>) -> Result<String, RuleViolation> {
        let present = ctx.range.map(|r| top_level_keys(&ctx.doc, &r)).unwrap_or_default();
        let missing: Vec<String> = ctx
            .config
            .required_keys
            .iter()
            .filter(|k| !present.contains(k))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(format!("{} contains all required top-level keys", ctx.config.binding))
        } else {
            Err(RuleViolation {
                class: FailureClass::MissingRequiredKeys,
                message: format!("{} is missing required top-level keys:", ctx.config.binding),
                items: missing,
            })
        }
    }
}

fn key_line_regex() -> Option<Regex> {
    Regex::new(r#"^\s*(?:([A-Za-z_$][A-Za-z0-9_$]*)|"([^"]*)"|'([^']*)')\s*:"#).ok()
}

/// Keys of `key:` lines that begin at the literal's first nesting level.
pub fn top_level_keys(doc: &SourceDocument, range: &LiteralRange) -> Vec<String> {
    let Some(re) = key_line_regex() else {
        return vec![];
    };
    let bytes = doc.masked();
    let text = doc.masked_str();
    let (start, end) = range.interior();
    let mut depth = DepthTracker::default();
    let mut keys = vec![];
    let mut line_start = true;
    let mut i = start;

    while i < end {
        if line_start && depth.is_top() {
            let line_end = text[i..end].find('\n').map_or(end, |n| i + n);
            if let Some(c) = re.captures(&text[i..line_end]) {
                if let Some(k) = c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)) {
                    keys.push(k.as_str().to_string());
                }
            }
        }
        line_start = false;

        let b = bytes[i];
        if is_quote(b) {
            i = skip_string(bytes, i).min(end);
            continue;
        }
        depth.observe(b);
        line_start = b == b'\n';
        i += 1;
    }
    keys
}

/// Validator-style orchestrator over the ordered rules.
pub struct IntegrityChecker {
    config: CheckConfig,
    rules: Vec<Box<dyn IntegrityRule>>,
}

impl IntegrityChecker {
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            rules: vec![
                Box::new(ModulesExistRule),
                Box::new(ExportNamesRule),
                Box::new(DeclarationRule),
                Box::new(RequiredKeysRule),
            ],
        }
    }

    /// Read-only: inspects the aggregate and its modules, never writes.
    pub fn run(&self) -> CheckReport {
        let aggregate = &self.config.aggregate;
        let mut report = CheckReport::new(aggregate);

        let text = match fs::read_to_string(aggregate) {
            Ok(text) => text,
            Err(e) => {
                report.failure = Some(FailureClass::AggregateUnreadable);
                report.findings.push(Finding {
                    severity: Severity::Failure,
                    rule: "aggregate".to_string(),
                    class: Some(FailureClass::AggregateUnreadable),
                    message: format!("Cannot read {}: {e}", aggregate.display()),
                    items: vec![],
                });
                return report;
            }
        };

        let doc = SourceDocument::new(text);
        let imports = parse_imports(doc.masked_str());
        report.imports = imports.len();
        if imports.is_empty() {
            report.findings.push(Finding::warning(
                "imports",
                "No imports found in aggregate. If you didn't split, this might be OK. If you did split, something is wrong.",
            ));
        } else {
            report.findings.push(Finding::info("imports", format!("Found {} imports in {}", imports.len(), aggregate.display())));
        }

        let base = aggregate.parent().unwrap_or_else(|| Path::new("."));
        let modules = imports.into_iter().map(|import| load_module(base, import)).collect();
        let mut ctx = CheckContext { config: &self.config, doc, modules, range: None };

        for rule in &self.rules {
            match rule.check(&mut ctx) {
                Ok(message) => {
                    tracing::debug!("rule {} passed", rule.name());
                    report.findings.push(Finding::info(rule.name(), message));
                }
                Err(violation) => {
                    tracing::warn!("rule {} failed with {} items", rule.name(), violation.items.len());
                    report.failure = Some(violation.class);
                    report.findings.push(Finding {
                        severity: Severity::Failure,
                        rule: rule.name().to_string(),
                        class: Some(violation.class),
                        message: violation.message,
                        items: violation.items,
                    });
                    return report;
                }
            }
        }

        report.present_keys = ctx.range.map(|r| top_level_keys(&ctx.doc, &r)).unwrap_or_default();
        report.entry_counts = entry_counts(&ctx.modules);
        for count in report.entry_counts.iter().filter(|c| c.entries.is_none()) {
            report.findings.push(Finding::warning("entry_counts", format!("Could not estimate entries for {}", count.name)));
        }
        report.passed = true;
        report
    }
}

fn load_module(base: &Path, import: ImportLine) -> LoadedModule {
    let path = resolve_path(base, Path::new(&import.path));
    let doc = match fs::read(&path) {
        Ok(bytes) => Some(SourceDocument::new(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) => {
            tracing::debug!("cannot read module {}: {}", path.display(), e);
            None
        }
    };
    LoadedModule { import, path, doc }
}

fn entry_counts(modules: &[LoadedModule]) -> Vec<EntryCount> {
    let mut counts: Vec<EntryCount> = modules
        .iter()
        .filter_map(|m| {
            let doc = m.doc.as_ref()?;
            Some(EntryCount {
                name: m.import.name.clone(),
                entries: estimate_entries(doc, &m.import.name),
            })
        })
        .collect();
    counts.sort_by_key(|c| c.name.to_lowercase());
    counts
}
