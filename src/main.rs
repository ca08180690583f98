//! CLI entry point for the litscan tool.

use std::io::IsTerminal;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use litscan_core::{Pipeline, RunConfig, export, spawn_progress_ui};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("litscan starting");

    // Configuration problems are the one fatal failure class; surface them
    // before any network activity.
    let config = RunConfig::load(&args.config)
        .with_context(|| format!("cannot use config file '{}'", args.config.display()))?;
    let output_path = config.output.json.clone();

    let pipeline = Pipeline::new(config)
        .refresh(args.refresh)
        .with_sample_limit(args.sample);

    let use_spinner = !args.no_progress && !args.quiet && std::io::stderr().is_terminal();
    let (spinner, stop) = spawn_progress_ui(use_spinner, pipeline.progress());

    let records = pipeline.run().await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    let records = records?;

    if let Err(error) = export::save_json(&records, &output_path) {
        warn!(error = %error, "export failed; results were not written");
    }

    info!(total = records.len(), "done");
    Ok(())
}
