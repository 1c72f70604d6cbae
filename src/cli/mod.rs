//! CLI interface using clap
//!
//! Provides the command-line interface for docfresh

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// docfresh - Documentation freshness auditing tool
#[derive(Parser, Debug)]
#[command(name = "docfresh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the repository (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Explicit configuration file (defaults to .docfresh/config.toml)
    #[arg(short, long, global = true, env = "DOCFRESH_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit extracted artifacts for documentation drift
    Audit(AuditArgs),

    /// Show or reset configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for audit command
#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// JSON file holding extracted artifacts (an array of artifacts)
    pub inventory: Option<String>,

    /// Markdown files to extract and add to the audit
    #[arg(short, long, num_args = 1..)]
    pub docs: Vec<String>,

    /// Exit with an error when any artifact scores below this value
    #[arg(long)]
    pub fail_under: Option<u32>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
