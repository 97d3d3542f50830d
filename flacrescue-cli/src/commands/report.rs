//! JSON report written by `--report`

use flacrescue_core::export::{ExportOutcome, ExportTally};
use flacrescue_core::scanner::ScanReport;
use flacrescue_core::timefmt::fmt_time;
use flacrescue_core::{BadRegion, StreamInfo, Track};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub input: PathBuf,
    pub dry_run: bool,
    pub cue_sheet: PathBuf,
    pub stream: StreamSummary,
    pub scan: ScanSummary,
    pub regions: Vec<RegionEntry>,
    pub tracks: Vec<TrackEntry>,
    pub tally: ExportTally,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamSummary {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub total_samples: u64,
    pub duration: String,
}

impl From<&StreamInfo> for StreamSummary {
    fn from(info: &StreamInfo) -> Self {
        Self {
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: info.bits_per_sample,
            total_samples: info.total_samples,
            duration: fmt_time(info.total_duration()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanSummary {
    pub frames_decoded: u64,
    pub false_syncs: u64,
    pub bytes_skipped: u64,
}

impl From<&ScanReport> for ScanSummary {
    fn from(report: &ScanReport) -> Self {
        Self {
            frames_decoded: report.frames_decoded,
            false_syncs: report.false_syncs,
            bytes_skipped: report.bytes_skipped,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionEntry {
    pub start: String,
    pub end: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl From<&BadRegion> for RegionEntry {
    fn from(region: &BadRegion) -> Self {
        Self {
            start: fmt_time(region.start),
            end: fmt_time(region.end),
            start_seconds: region.start.as_secs_f64(),
            end_seconds: region.end.as_secs_f64(),
        }
    }
}

/// Per-track result
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackStatus {
    Exported { output: PathBuf },
    Planned { output: PathBuf },
    Damaged { region: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackEntry {
    pub number: usize,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(flatten)]
    pub status: TrackStatus,
}

impl TrackEntry {
    pub fn new(track: &Track, outcome: &ExportOutcome, dry_run: bool) -> Self {
        let status = match outcome {
            ExportOutcome::Exported { output } if dry_run => TrackStatus::Planned {
                output: output.clone(),
            },
            ExportOutcome::Exported { output } => TrackStatus::Exported {
                output: output.clone(),
            },
            ExportOutcome::Damaged { region } => TrackStatus::Damaged { region: *region },
            ExportOutcome::Skipped(err) => TrackStatus::Skipped {
                reason: err.to_string(),
            },
            ExportOutcome::Failed(err) => TrackStatus::Failed {
                reason: err.to_string(),
            },
        };
        Self {
            number: track.number(),
            title: track.title.clone(),
            performer: track.performer.clone(),
            start: fmt_time(track.start),
            end: fmt_time(track.end),
            status,
        }
    }
}
