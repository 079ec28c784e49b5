//! datasplit - split an aggregate's declaration into per-key modules
//!
//! Prints a summary (or the JSON report with --json) to stdout.
//! Exit 1 on structural, config or filesystem errors, 2 on a name collision.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use datasplit_core::{logging, SplitConfig, SplitError, SplitPipeline, SplitRequest};

#[derive(Parser)]
#[command(name = "datasplit")]
#[command(about = "Split `export const DB = { ... }` into one module per top-level key")]
struct Cli {
    /// Aggregate file to split
    aggregate: PathBuf,

    /// Module root (default: `data` next to the aggregate)
    output_dir: Option<PathBuf>,

    /// Keys kept inline, comma separated; replaces the default set
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// JSON split configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plan and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the split report as JSON
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
        Some(path) => match SplitConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SplitConfig::default(),
    };
    if let Some(keys) = cli.exclude {
        config = config.with_excludes(keys);
    }

    let pipeline = SplitPipeline::new(config);
    let request = SplitRequest {
        aggregate: cli.aggregate,
        output_dir: cli.output_dir,
        dry_run: cli.dry_run,
    };

    match pipeline.run(&request) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                let excludes: Vec<_> = pipeline.config().excludes.iter().collect();
                println!("{}", if report.dry_run { "Dry run, nothing written." } else { "Split complete." });
                println!("- Excluded (kept inline): {excludes:?}");
                println!("- Modules root: {}", report.output_dir.display());
                for m in &report.modules {
                    println!("  {} -> {}", m.key, m.import_path);
                }
                println!("- Aggregator: {}", report.aggregate.display());
                println!("- Backup: {} ({:?})", report.backup_path.display(), report.backup);
            }
            ExitCode::SUCCESS
        }
        Err(e @ SplitError::NameCollision { .. }) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
