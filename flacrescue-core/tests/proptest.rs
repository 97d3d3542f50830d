//! Property-based tests using proptest

use flacrescue_core::{
    decoder::{parse_frame_header, FlacDecoder},
    encoder::StreamBuilder,
    reconciler::{reconcile, Reconciler},
    sanitize::{is_rewritten, sanitize_title},
    scanner::{bad_region_between, scan_frames},
    BadRegion, ExportDecision, StreamInfo, Track,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::time::Duration;

const FORBIDDEN: &[char] = &[
    ' ', '.', '*', '/', ':', '\\', '?', ',', ';', '(', ')', '!', '"', '\'', '&', '<', '>', '|',
    '’', '¡',
];

/// Sorted, non-overlapping regions from a list of (gap, length) pairs in milliseconds
fn regions_from(parts: &[(u64, u64)]) -> Vec<BadRegion> {
    let mut at = 0u64;
    parts
        .iter()
        .map(|&(gap, len)| {
            let start = at + gap;
            at = start + len;
            BadRegion::new(Duration::from_millis(start), Duration::from_millis(at))
        })
        .collect()
}

/// Contiguous tracks from a list of lengths in milliseconds (zero-length allowed)
fn tracks_from(lengths: &[u64]) -> Vec<Track> {
    let mut at = 0u64;
    lengths
        .iter()
        .enumerate()
        .map(|(index, &len)| {
            let start = at;
            at += len;
            Track {
                index,
                title: Some(format!("t{}", index)),
                performer: None,
                start: Duration::from_millis(start),
                end: Duration::from_millis(at),
            }
        })
        .collect()
}

/// Reference overlap test on half-open intervals; a zero-width region is a point
fn overlaps(region: &BadRegion, track: &Track) -> bool {
    if region.is_zero_width() {
        track.start <= region.start && region.start < track.end
    } else {
        region.start < track.end && region.end > track.start
    }
}

fn scan_info(frames: u64) -> StreamInfo {
    StreamInfo {
        min_block_size: 1152,
        max_block_size: 1152,
        min_frame_size: 0,
        max_frame_size: 0,
        sample_rate: 48_000,
        channels: 2,
        bits_per_sample: 16,
        total_samples: 1152 * frames,
    }
}

proptest! {
    #[test]
    fn prop_sanitize_idempotent(title in any::<String>()) {
        let once = sanitize_title(&title);
        prop_assert_eq!(sanitize_title(&once), once.clone());
    }

    #[test]
    fn prop_sanitize_removes_forbidden(title in "[ -~’¡äé]{0,64}") {
        let out = sanitize_title(&title);
        prop_assert!(!out.chars().any(|c| FORBIDDEN.contains(&c)));
        prop_assert!(!out.chars().any(is_rewritten));
    }

    #[test]
    fn prop_reconcile_matches_reference(
        region_parts in prop::collection::vec((0u64..20_000, 0u64..5_000), 0..12),
        track_lengths in prop::collection::vec(0u64..60_000, 1..12),
    ) {
        let regions = regions_from(&region_parts);
        let tracks = tracks_from(&track_lengths);

        let decisions = reconcile(&tracks, &regions);

        for (track, decision) in tracks.iter().zip(&decisions) {
            let hit = regions.iter().any(|r| overlaps(r, track));
            match decision {
                ExportDecision::Intact => prop_assert!(!hit, "track {:?} should be damaged", track),
                ExportDecision::Damaged { region } => {
                    prop_assert!(hit, "track {:?} should be intact", track);
                    prop_assert!(overlaps(&regions[*region], track));
                }
            }
        }
    }

    #[test]
    fn prop_cursor_is_monotonic(
        region_parts in prop::collection::vec((0u64..20_000, 0u64..5_000), 0..12),
        track_lengths in prop::collection::vec(0u64..60_000, 1..12),
    ) {
        let regions = regions_from(&region_parts);
        let tracks = tracks_from(&track_lengths);
        let mut reconciler = Reconciler::new(&regions);

        let mut last = 0;
        for track in &tracks {
            reconciler.classify(track);
            prop_assert!(reconciler.cursor() >= last);
            prop_assert!(reconciler.cursor() <= regions.len());
            last = reconciler.cursor();
        }
    }

    #[test]
    fn prop_bad_region_never_inverted(last_good in 0u64..1_000_000, recovered in 0u64..1_000_000) {
        let region = bad_region_between(&scan_info(1), last_good, recovered);
        prop_assert!(region.end >= region.start);
    }

    #[test]
    fn prop_scan_regions_ordered_and_bounded(
        broken in prop::collection::btree_set(0usize..40, 0..6),
    ) {
        // keep the final frame intact so resynchronization always has a target
        let broken: BTreeSet<usize> = broken.into_iter().filter(|&i| i < 39).collect();
        let mut stream = StreamBuilder::new(scan_info(40)).fixed_frames(40, 32).unwrap();
        for &i in &broken {
            stream.corrupt_frame(i);
        }
        let mut decoder = FlacDecoder::open(Cursor::new(stream.bytes)).unwrap();

        let report = scan_frames(&mut decoder).unwrap();

        prop_assert_eq!(report.frames_decoded as usize, 40 - broken.len());
        for region in &report.bad_regions {
            prop_assert!(region.end >= region.start);
        }
        for pair in report.bad_regions.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        // consecutive broken frames collapse into one region
        let runs = broken
            .iter()
            .filter(|&&i| i == 0 || !broken.contains(&(i - 1)))
            .count();
        prop_assert_eq!(report.bad_regions.len(), runs);
    }

    #[test]
    fn prop_header_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..32)) {
        let _ = parse_frame_header(&data, 0);
    }
}
