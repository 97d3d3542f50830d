//! Demo: find the damage in a synthetic capture and plan the track exports

use flacrescue_core::{
    cue::parse_cue_sheet,
    decoder::{FlacDecoder, FrameDecoder},
    encoder::StreamBuilder,
    export::build_invocation,
    reconciler::reconcile,
    scanner::scan_frames,
    timefmt::fmt_time,
    ExportDecision, StreamInfo,
};
use std::io::Cursor;
use std::path::Path;

const CUE: &str = r#"PERFORMER "Night Shift"
TITLE "Live at the Depot"
FILE "depot.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Arrival"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Platform 9"
    INDEX 01 01:00:00
  TRACK 03 AUDIO
    TITLE "Freight (Slow)"
    INDEX 01 02:30:00
  TRACK 04 AUDIO
    TITLE "Departure"
    INDEX 01 03:20:00
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("flacrescue Damaged Capture Example\n");

    // Step 1: Build a clean four-minute stream
    println!("Step 1: Creating 480 half-second frames...");
    let info = StreamInfo {
        min_block_size: 500,
        max_block_size: 500,
        min_frame_size: 0,
        max_frame_size: 0,
        sample_rate: 1_000,
        channels: 2,
        bits_per_sample: 16,
        total_samples: 240_000,
    };
    let mut stream = StreamBuilder::new(info).fixed_frames(480, 24)?.bytes;
    println!("Created clean stream: {} bytes\n", stream.len());

    // Step 2: Simulate damage
    println!("Step 2: Simulating damage...");
    stream[4000..4400].fill(0x00);
    println!("Zeroed bytes 4000-4400");
    stream.drain(12000..12100);
    println!("Deleted bytes 12000-12100");
    println!("Damaged stream: {} bytes\n", stream.len());

    // Step 3: Scan
    println!("Step 3: Scanning damaged stream...");
    let mut decoder = FlacDecoder::open(Cursor::new(stream))?;
    let report = scan_frames(&mut decoder)?;

    println!("Scan Results:");
    println!("  Frames decoded:    {}", report.frames_decoded);
    println!("  False syncs:       {}", report.false_syncs);
    println!("  Bytes skipped:     {}", report.bytes_skipped);
    for region in &report.bad_regions {
        println!("  Bad region:        {} - {}", fmt_time(region.start), fmt_time(region.end));
    }
    println!();

    // Step 4: Classify tracks
    println!("Step 4: Matching against the cue sheet...");
    let tracks = parse_cue_sheet(CUE)?.tracks(report.stream_end(&info));
    let decisions = reconcile(&tracks, &report.bad_regions);
    let source = Path::new("depot.flac.part");

    for (i, (track, decision)) in tracks.iter().zip(&decisions).enumerate() {
        match decision {
            ExportDecision::Intact => {
                let invocation = build_invocation(source, track, i + 1 == tracks.len())?;
                println!("  ✓ {:02} -> {}", track.number(), invocation.output.display());
            }
            ExportDecision::Damaged { region } => {
                println!("  ✗ {:02} overlaps bad region {}", track.number(), region + 1);
            }
        }
    }

    let recovered = decisions.iter().filter(|d| d.is_intact()).count();
    println!("\nRecovered {} of {} tracks", recovered, tracks.len());

    Ok(())
}
