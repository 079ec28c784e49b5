//! Aggregate Splitter - Structural Source Splitting
//!
//! # The Guarantees
//! 1. Values Are Verbatim
//! 2. Comments And Strings Never Move Depth
//! 3. Partial Parses Never Split
//! 4. The Backup Is Taken Once
//! 5. The Aggregate Is Written Last
//! 6. Same Key, Same Names

pub mod source;
pub mod scan;
pub mod entries;
pub mod naming;
pub mod config;
pub mod emit;
pub mod aggregate;
pub mod backup;
pub mod hashing;
pub mod pipeline;
pub mod check;
pub mod logging;

pub use source::{SourceDocument, mask};
pub use scan::{LiteralRange, StructuralError, locate_declaration, count_top_level};
pub use entries::{Entry, split_entries};
pub use naming::{export_name, file_name_stem, is_identifier};
pub use config::{SplitConfig, CheckConfig, GroupRule, ConfigError};
pub use emit::ModuleFile;
pub use aggregate::{AggregatorPlan, ImportLine};
pub use backup::{BackupGuard, BackupOutcome};
pub use pipeline::{CollisionKind, SplitPipeline, SplitRequest, SplitPlan, SplitReport, SplitError};
pub use check::{IntegrityChecker, CheckReport, FailureClass, Severity};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
