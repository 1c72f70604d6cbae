//! docfresh - Documentation freshness auditing tool
//!
//! Cross-references code entities with their documentation and reports where
//! the two have drifted apart.

use anyhow::Result;
use clap::Parser;
use docfresh::cli::{
    audit, load_config, print_report_json, print_report_text, reset_config, show_config, Cli,
    Commands, OutputFormat,
};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging; stdout carries the report, so logs go to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Get repository path
    let repo_path = Path::new(&cli.path);

    match cli.command {
        Commands::Audit(args) => {
            let config = load_config(repo_path, cli.config.as_deref())?;
            let report = audit(repo_path, config, args.inventory.as_deref(), &args.docs)?;

            match cli.format {
                OutputFormat::Json => print_report_json(&report)?,
                OutputFormat::Text => print_report_text(&report),
            }

            if let Some(threshold) = args.fail_under {
                let lowest = report.lowest_score();
                if lowest < threshold {
                    anyhow::bail!("Lowest freshness score {} is below {}", lowest, threshold);
                }
            }
        }

        Commands::Config(args) => {
            if args.reset {
                reset_config(repo_path)?;
            }

            if args.show || !args.reset {
                let config = load_config(repo_path, cli.config.as_deref())?;
                show_config(&config)?;
            }
        }
    }

    Ok(())
}
