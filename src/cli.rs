//! Command-line argument definitions for the litscan binary.

use std::path::PathBuf;

use clap::Parser;

/// Collects scholarly works from Crossref and checks their availability.
#[derive(Debug, Parser)]
#[command(name = "litscan", version, about)]
pub struct Args {
    /// Path to the JSON run configuration.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Ignore an existing checkpoint and re-collect from Crossref.
    #[arg(long)]
    pub refresh: bool,

    /// Enrich only the first N checkpointed works (sampling harness).
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,

    /// Disable the progress spinner.
    #[arg(long)]
    pub no_progress: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}
