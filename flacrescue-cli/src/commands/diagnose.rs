use crate::commands::report::{Report, RegionEntry, ScanSummary, StreamSummary, TrackEntry};
use anyhow::{Context, Result};
use colored::Colorize;
use flacrescue_core::cue::{locate_cue_sheet, read_cue_sheet};
use flacrescue_core::decoder::{FlacDecoder, FrameDecoder};
use flacrescue_core::export::{
    export_tracks, EncoderInvocation, ExportOutcome, ExportTally, FlacCommand, TrackEncoder,
};
use flacrescue_core::reconciler::reconcile;
use flacrescue_core::scanner::{scan_frames_with_observer, ScanEvent, ScanReport};
use flacrescue_core::timefmt::{fmt_cd_time, fmt_time};
use flacrescue_core::{ExportDecision, RescueError, Track};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the `flacrescue` command line controls
#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    pub input: PathBuf,
    pub cue: Option<PathBuf>,
    pub encoder: PathBuf,
    pub dry_run: bool,
    pub cd_time: bool,
    pub report: Option<PathBuf>,
    pub progress: bool,
}

impl DiagnoseOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            cue: None,
            encoder: PathBuf::from("flac"),
            dry_run: false,
            cd_time: false,
            report: None,
            progress: false,
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct DiagnoseSummary {
    pub scan: ScanReport,
    pub decisions: Vec<ExportDecision>,
    pub outcomes: Vec<ExportOutcome>,
    pub tally: ExportTally,
}

/// Logs what would be run instead of running it
#[derive(Debug, Default)]
pub struct DryRunEncoder {
    pub planned: Vec<EncoderInvocation>,
}

impl TrackEncoder for DryRunEncoder {
    fn encode(&mut self, invocation: &EncoderInvocation) -> Result<(), RescueError> {
        info!(
            "[dry run] track {:02} -> {}",
            invocation.track,
            invocation.output.display()
        );
        debug!("[dry run] args: {:?}", invocation.args);
        self.planned.push(invocation.clone());
        Ok(())
    }
}

pub fn execute(opts: &DiagnoseOptions) -> Result<DiagnoseSummary> {
    let fmt: fn(Duration) -> String = if opts.cd_time { fmt_cd_time } else { fmt_time };

    info!("Diagnosing file: {}", opts.input.display());

    let file = File::open(&opts.input)
        .with_context(|| format!("Failed to open input file: {}", opts.input.display()))?;
    let mut decoder = FlacDecoder::open(BufReader::new(file))
        .with_context(|| format!("Not a readable FLAC stream: {}", opts.input.display()))?;
    let stream_info = *decoder.stream_info();

    info!(
        "Stream: {} Hz, {} channels, {} bits, {} long",
        stream_info.sample_rate,
        stream_info.channels,
        stream_info.bits_per_sample,
        fmt(stream_info.total_duration())
    );

    let bar = progress_bar(opts.progress, stream_info.total_samples);
    let mut regions_seen = 0usize;
    let scan = scan_frames_with_observer(&mut decoder, |event| match event {
        ScanEvent::Frame(frame) => {
            bar.set_position(frame.first_sample(&stream_info) + u64::from(frame.header.block_size));
        }
        ScanEvent::BadRegion(_) => {
            regions_seen += 1;
            bar.set_message(format!("{} bad regions", regions_seen));
        }
    });
    bar.finish_and_clear();
    let scan = scan.with_context(|| format!("Frame scan failed: {}", opts.input.display()))?;

    println!("\n=== Scan Results ===");
    println!("Frames decoded:    {}", scan.frames_decoded);
    println!("False syncs:       {}", scan.false_syncs);
    println!("Bytes skipped:     {} bytes", scan.bytes_skipped);
    println!("Bad regions:       {}", scan.bad_regions.len());
    for region in &scan.bad_regions {
        println!(
            "  {} {} - {} ({})",
            "✗".red(),
            fmt(region.start),
            fmt(region.end),
            fmt(region.duration())
        );
    }
    println!();

    let cue_path = opts
        .cue
        .clone()
        .unwrap_or_else(|| locate_cue_sheet(&opts.input));
    let sheet = read_cue_sheet(&cue_path)
        .with_context(|| format!("Failed to read cue sheet: {}", cue_path.display()))?;
    let tracks = sheet.tracks(scan.stream_end(&stream_info));
    info!("Cue sheet {} lists {} tracks", cue_path.display(), tracks.len());

    let decisions = reconcile(&tracks, &scan.bad_regions);
    for (track, decision) in tracks.iter().zip(&decisions) {
        log_decision(track, decision, &scan, fmt);
    }

    let on_outcome = |track: &Track, outcome: &ExportOutcome| match outcome {
        ExportOutcome::Exported { output } if opts.dry_run => {
            println!(
                "{} {:02} would write {}",
                "·".cyan(),
                track.number(),
                output.display()
            );
        }
        ExportOutcome::Exported { output } => {
            println!(
                "{} {:02} {}",
                "✓".green(),
                track.number(),
                output.display()
            );
        }
        ExportOutcome::Damaged { .. } => {
            println!("{} {:02} damaged", "✗".red(), track.number());
        }
        ExportOutcome::Skipped(err) | ExportOutcome::Failed(err) => {
            println!("{} {:02} {}", "✗".yellow(), track.number(), err);
        }
    };

    let (outcomes, tally) = if opts.dry_run {
        let mut encoder = DryRunEncoder::default();
        export_tracks(&opts.input, &tracks, &decisions, &mut encoder, on_outcome)
    } else {
        let mut encoder = FlacCommand::new(&opts.encoder);
        export_tracks(&opts.input, &tracks, &decisions, &mut encoder, on_outcome)
    };

    print_summary(&tally, opts.dry_run);

    if let Some(report_path) = &opts.report {
        let report = Report {
            input: opts.input.clone(),
            dry_run: opts.dry_run,
            cue_sheet: cue_path.clone(),
            stream: StreamSummary::from(&stream_info),
            scan: ScanSummary::from(&scan),
            regions: scan.bad_regions.iter().map(RegionEntry::from).collect(),
            tracks: tracks
                .iter()
                .zip(&outcomes)
                .map(|(track, outcome)| TrackEntry::new(track, outcome, opts.dry_run))
                .collect(),
            tally,
        };
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "Failed to serialize report")?;
        fs::write(report_path, json)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

        info!("Report written to: {}", report_path.display());
    }

    Ok(DiagnoseSummary {
        scan,
        decisions,
        outcomes,
        tally,
    })
}

fn progress_bar(enabled: bool, total_samples: u64) -> ProgressBar {
    if !enabled || total_samples == 0 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total_samples);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

fn log_decision(
    track: &Track,
    decision: &ExportDecision,
    scan: &ScanReport,
    fmt: fn(Duration) -> String,
) {
    let title = track.title().unwrap_or("<untitled>");
    match decision {
        ExportDecision::Intact => info!(
            "Track {:02} good: {} [{} - {}]",
            track.number(),
            title,
            fmt(track.start),
            fmt(track.end)
        ),
        ExportDecision::Damaged { region } => {
            if let Some(bad) = scan.bad_regions.get(*region) {
                warn!(
                    "Track {:02} damaged: {} [{} - {}] overlaps {} - {}",
                    track.number(),
                    title,
                    fmt(track.start),
                    fmt(track.end),
                    fmt(bad.start),
                    fmt(bad.end)
                );
            }
        }
    }
}

/// Closing line of a run; a dry run only reports what it would recover
pub fn summary_line(tally: &ExportTally, dry_run: bool) -> String {
    if dry_run {
        format!(
            "Would recover {} of {} tracks (dry run, nothing written)",
            tally.recovered, tally.total
        )
    } else {
        format!("Recovered {} of {} tracks", tally.recovered, tally.total)
    }
}

fn print_summary(tally: &ExportTally, dry_run: bool) {
    let line = summary_line(tally, dry_run);
    if dry_run {
        println!("\n{} {}", "·".cyan(), line);
    } else if tally.recovered == tally.total {
        println!("\n{} {}", "✓".green(), line.green());
    } else {
        println!("\n{} {}", "✗".yellow(), line.yellow());
    }
    if tally.skipped > 0 {
        println!("  {} skipped (no title)", tally.skipped);
    }
    if tally.failed > 0 {
        println!("  {} failed to encode", tally.failed);
    }
}
