use anyhow::Result;
use clap::Parser;
use flacrescue_cli::diagnose::{self, DiagnoseOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "flacrescue")]
#[command(about = "Find the damaged parts of a FLAC capture and re-extract the tracks that survived", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// FLAC file to diagnose (a trailing .part is accepted)
    input: PathBuf,

    /// Cue sheet to use instead of the one beside the input
    #[arg(long)]
    cue: Option<PathBuf>,

    /// Encoder program used to re-extract tracks
    #[arg(long, default_value = "flac")]
    encoder: PathBuf,

    /// Scan and classify tracks without running the encoder
    #[arg(long)]
    dry_run: bool,

    /// Show times as MM:SS:FF cue timecodes
    #[arg(long)]
    cd_time: bool,

    /// Write a JSON report of regions and track results
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let opts = DiagnoseOptions {
        input: cli.input,
        cue: cli.cue,
        encoder: cli.encoder,
        dry_run: cli.dry_run,
        cd_time: cli.cd_time,
        report: cli.report,
        progress: true,
    };
    diagnose::execute(&opts)?;
    Ok(())
}
