//! Bad-region to track reconciliation
//!
//! Tracks and bad regions are both ordered by time, so a single cursor into
//! the region list is enough: it only moves past regions that end before the
//! current track starts, and such regions cannot touch any later track either.

use crate::types::{BadRegion, ExportDecision, Track};

#[cfg(feature = "logging")]
use tracing::debug;

/// Classifies tracks one at a time in ascending order
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    regions: &'a [BadRegion],
    cursor: usize,
}

impl<'a> Reconciler<'a> {
    /// Start at the first region
    pub fn new(regions: &'a [BadRegion]) -> Self {
        Self { regions, cursor: 0 }
    }

    /// Index of the first region not yet known to precede every remaining track
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Decide whether `track` can be exported
    ///
    /// Tracks must be fed in ascending start order.
    pub fn classify(&mut self, track: &Track) -> ExportDecision {
        while let Some(region) = self.regions.get(self.cursor) {
            if region.start >= track.end {
                // later regions start later still
                return ExportDecision::Intact;
            }
            if precedes(region, track) {
                self.cursor += 1;
                continue;
            }

            #[cfg(feature = "logging")]
            debug!(
                "Track {} overlaps bad region {}",
                track.number(),
                self.cursor + 1
            );

            return ExportDecision::Damaged {
                region: self.cursor,
            };
        }
        ExportDecision::Intact
    }
}

/// Whether the region lies entirely before the track starts
///
/// A zero-width region sitting exactly on the track start is inside the track.
fn precedes(region: &BadRegion, track: &Track) -> bool {
    region.end < track.start || (region.end == track.start && !region.is_zero_width())
}

/// Classify every track against the bad regions in one forward pass
pub fn reconcile(tracks: &[Track], regions: &[BadRegion]) -> Vec<ExportDecision> {
    let mut reconciler = Reconciler::new(regions);
    tracks.iter().map(|track| reconciler.classify(track)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn track(index: usize, start: u64, end: u64) -> Track {
        Track {
            index,
            title: Some(format!("Track {}", index + 1)),
            performer: None,
            start: secs(start),
            end: secs(end),
        }
    }

    fn region(start: u64, end: u64) -> BadRegion {
        BadRegion::new(secs(start), secs(end))
    }

    #[test]
    fn test_three_track_scenario() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180), track(2, 180, 240)];
        let regions = vec![region(95, 100)];

        let decisions = reconcile(&tracks, &regions);

        assert_eq!(
            decisions,
            vec![
                ExportDecision::Intact,
                ExportDecision::Damaged { region: 0 },
                ExportDecision::Intact,
            ]
        );
        assert_eq!(decisions.iter().filter(|d| d.is_intact()).count(), 2);
    }

    #[test]
    fn test_region_at_track_end_is_exclusive() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180)];
        let regions = vec![region(90, 95)];

        assert_eq!(
            reconcile(&tracks, &regions),
            vec![ExportDecision::Intact, ExportDecision::Damaged { region: 0 }]
        );
    }

    #[test]
    fn test_region_ending_at_track_start_precedes() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180)];
        let regions = vec![region(80, 90)];

        assert_eq!(
            reconcile(&tracks, &regions),
            vec![ExportDecision::Damaged { region: 0 }, ExportDecision::Intact]
        );
    }

    #[test]
    fn test_zero_width_region_inside_track() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180)];

        let inside = vec![region(120, 120)];
        assert_eq!(
            reconcile(&tracks, &inside),
            vec![ExportDecision::Intact, ExportDecision::Damaged { region: 0 }]
        );

        // sits on the boundary: belongs to the second track only
        let boundary = vec![region(90, 90)];
        assert_eq!(
            reconcile(&tracks, &boundary),
            vec![ExportDecision::Intact, ExportDecision::Damaged { region: 0 }]
        );
    }

    #[test]
    fn test_no_regions_all_intact() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180), track(2, 180, 240)];
        assert!(reconcile(&tracks, &[]).iter().all(|d| d.is_intact()));
    }

    #[test]
    fn test_region_spanning_tracks_damages_both() {
        let tracks = vec![track(0, 0, 90), track(1, 90, 180), track(2, 180, 240)];
        let regions = vec![region(85, 95), region(200, 210)];

        assert_eq!(
            reconcile(&tracks, &regions),
            vec![
                ExportDecision::Damaged { region: 0 },
                ExportDecision::Damaged { region: 0 },
                ExportDecision::Damaged { region: 1 },
            ]
        );
    }

    #[test]
    fn test_cursor_only_advances() {
        let tracks = vec![track(0, 0, 10), track(1, 10, 20), track(2, 20, 30), track(3, 30, 40)];
        let regions = vec![region(1, 2), region(3, 4), region(25, 26)];
        let mut reconciler = Reconciler::new(&regions);

        let mut last = reconciler.cursor();
        for t in &tracks {
            reconciler.classify(t);
            assert!(reconciler.cursor() >= last);
            last = reconciler.cursor();
        }
        assert_eq!(last, regions.len());
    }

    #[test]
    fn test_regions_exhausted_early() {
        // the last region is long gone by the final track
        let tracks = vec![track(0, 0, 10), track(1, 10, 20), track(2, 20, 30)];
        let regions = vec![region(2, 3)];

        assert_eq!(
            reconcile(&tracks, &regions),
            vec![
                ExportDecision::Damaged { region: 0 },
                ExportDecision::Intact,
                ExportDecision::Intact,
            ]
        );
    }
}
