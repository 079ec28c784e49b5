//! datacheck - verify a split aggregate against its modules
//!
//! Exit codes: 0 passed, 1 aggregate unreadable, 2 missing module,
//! 3 export mismatch, 4 declaration not found, 5 missing required keys,
//! 6 unbalanced braces.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use datasplit_core::{logging, CheckConfig, IntegrityChecker};

#[derive(Parser)]
#[command(name = "datacheck")]
#[command(about = "Check that a split aggregate and its modules are consistent")]
struct Cli {
    /// Aggregate file (default: static/js/data.js)
    aggregate: Option<PathBuf>,

    /// Required top-level keys, comma separated; replaces the default list
    #[arg(long, value_delimiter = ',')]
    require: Option<Vec<String>>,

    /// Declaration name
    #[arg(long)]
    binding: Option<String>,

    /// JSON check configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the check report as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => match CheckConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => CheckConfig::default(),
    };
    if let Some(aggregate) = cli.aggregate {
        config.aggregate = aggregate;
    }
    if let Some(binding) = cli.binding {
        config.binding = binding;
    }
    if let Some(keys) = cli.require {
        config.required_keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }

    let report = IntegrityChecker::new(config).run();

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", report.render_text());
    }

    ExitCode::from(report.exit_code())
}
