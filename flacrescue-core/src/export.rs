//! Re-extraction of intact tracks through the external `flac` encoder

use crate::error::RescueError;
use crate::sanitize::sanitize_title;
use crate::timefmt::fmt_time;
use crate::types::{ExportDecision, Track};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Flags passed on every invocation: maximum compression, verify output, quiet
pub const BASE_FLAGS: &[&str] = &["--best", "--verify", "--silent"];

/// One fully built encoder command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    /// 1-based track number
    pub track: usize,

    /// File the encoder will write
    pub output: PathBuf,

    /// Arguments, source file last
    pub args: Vec<OsString>,
}

/// Something that turns an invocation into an output file
pub trait TrackEncoder {
    /// Run one invocation to completion
    fn encode(&mut self, invocation: &EncoderInvocation) -> Result<(), RescueError>;
}

/// Runs the `flac` command-line encoder as a blocking subprocess
#[derive(Debug, Clone)]
pub struct FlacCommand {
    program: PathBuf,
}

impl FlacCommand {
    /// Use `program` as the encoder executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FlacCommand {
    fn default() -> Self {
        Self::new("flac")
    }
}

impl TrackEncoder for FlacCommand {
    fn encode(&mut self, invocation: &EncoderInvocation) -> Result<(), RescueError> {
        #[cfg(feature = "logging")]
        debug!(
            "Running {} {:?}",
            self.program.display(),
            invocation.args
        );

        let output = Command::new(&self.program)
            .args(&invocation.args)
            .output()
            .map_err(|source| RescueError::EncoderSpawn {
                track: invocation.track,
                source,
            })?;

        if !output.status.success() {
            return Err(RescueError::EncoderFailed {
                track: invocation.track,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `NN-<sanitized title>.flac` beside the source file
pub fn output_path(source: &Path, track: &Track) -> Result<PathBuf, RescueError> {
    let title = track.title().ok_or(RescueError::MissingTitle {
        track: track.number(),
    })?;
    let name = format!("{:02}-{}.flac", track.number(), sanitize_title(title));
    Ok(source
        .parent()
        .map(|dir| dir.join(&name))
        .unwrap_or_else(|| PathBuf::from(&name)))
}

/// Build the encoder command line for one track
///
/// `--skip` is left out for a track starting at zero and `--until` for the
/// final track, which runs to the end of the file.
pub fn build_invocation(
    source: &Path,
    track: &Track,
    is_last: bool,
) -> Result<EncoderInvocation, RescueError> {
    let output = output_path(source, track)?;
    // output_path already rejected a missing title
    let title = track.title().unwrap_or_default();

    let mut args: Vec<OsString> = BASE_FLAGS.iter().map(OsString::from).collect();

    let mut output_arg = OsString::from("--output-name=");
    output_arg.push(output.as_os_str());
    args.push(output_arg);

    args.push(format!("--tag=TITLE={}", title).into());
    if let Some(performer) = track.performer() {
        args.push(format!("--tag=ARTIST={}", performer).into());
    }
    if track.start > Duration::ZERO {
        args.push(format!("--skip={}", fmt_time(track.start)).into());
    }
    if !is_last {
        args.push(format!("--until={}", fmt_time(track.end)).into());
    }
    args.push(source.as_os_str().to_os_string());

    Ok(EncoderInvocation {
        track: track.number(),
        output,
        args,
    })
}

/// Build and run the encoder for one intact track
pub fn export_track<E: TrackEncoder + ?Sized>(
    source: &Path,
    track: &Track,
    is_last: bool,
    encoder: &mut E,
) -> Result<PathBuf, RescueError> {
    let invocation = build_invocation(source, track, is_last)?;
    encoder.encode(&invocation)?;
    Ok(invocation.output)
}

/// What happened to one track
#[derive(Debug)]
pub enum ExportOutcome {
    /// Encoder wrote the file
    Exported {
        /// Path of the new file
        output: PathBuf,
    },
    /// Track overlaps a bad region and was not exported
    Damaged {
        /// Index into the bad-region list
        region: usize,
    },
    /// Track could not be exported for lack of a title
    Skipped(RescueError),
    /// Encoder failed to start or exited unsuccessfully
    Failed(RescueError),
}

/// Counts over all tracks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTally {
    /// Tracks exported
    pub recovered: usize,
    /// Tracks overlapping a bad region
    pub damaged: usize,
    /// Intact tracks skipped for a missing title
    pub skipped: usize,
    /// Intact tracks whose encoder run failed
    pub failed: usize,
    /// All tracks
    pub total: usize,
}

impl ExportTally {
    fn record(&mut self, outcome: &ExportOutcome) {
        match outcome {
            ExportOutcome::Exported { .. } => self.recovered += 1,
            ExportOutcome::Damaged { .. } => self.damaged += 1,
            ExportOutcome::Skipped(_) => self.skipped += 1,
            ExportOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Export every intact track, continuing past per-track failures
///
/// `tracks` and `decisions` are parallel. `on_outcome` is called once per
/// track, in order, as soon as that track is settled.
pub fn export_tracks<E, F>(
    source: &Path,
    tracks: &[Track],
    decisions: &[ExportDecision],
    encoder: &mut E,
    mut on_outcome: F,
) -> (Vec<ExportOutcome>, ExportTally)
where
    E: TrackEncoder + ?Sized,
    F: FnMut(&Track, &ExportOutcome),
{
    let mut outcomes = Vec::with_capacity(tracks.len());
    let mut tally = ExportTally {
        total: tracks.len(),
        ..Default::default()
    };

    for (i, (track, decision)) in tracks.iter().zip(decisions).enumerate() {
        let outcome = match decision {
            ExportDecision::Damaged { region } => ExportOutcome::Damaged { region: *region },
            ExportDecision::Intact => {
                let is_last = i + 1 == tracks.len();
                match export_track(source, track, is_last, encoder) {
                    Ok(output) => ExportOutcome::Exported { output },
                    Err(err @ RescueError::MissingTitle { .. }) => {
                        #[cfg(feature = "logging")]
                        warn!("Skipping track {}: {}", track.number(), err);

                        ExportOutcome::Skipped(err)
                    }
                    Err(err) => {
                        #[cfg(feature = "logging")]
                        warn!("Export of track {} failed: {}", track.number(), err);

                        ExportOutcome::Failed(err)
                    }
                }
            }
        };
        tally.record(&outcome);
        on_outcome(track, &outcome);
        outcomes.push(outcome);
    }

    (outcomes, tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: usize, title: Option<&str>, performer: Option<&str>, start: u64, end: u64) -> Track {
        Track {
            index,
            title: title.map(String::from),
            performer: performer.map(String::from),
            start: Duration::from_secs(start),
            end: Duration::from_secs(end),
        }
    }

    fn args_of(invocation: &EncoderInvocation) -> Vec<String> {
        invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<EncoderInvocation>,
        fail_track: Option<usize>,
    }

    impl TrackEncoder for Recorder {
        fn encode(&mut self, invocation: &EncoderInvocation) -> Result<(), RescueError> {
            self.calls.push(invocation.clone());
            if self.fail_track == Some(invocation.track) {
                return Err(RescueError::EncoderSpawn {
                    track: invocation.track,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no encoder"),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_first_track_omits_skip() {
        let source = Path::new("/rips/show.flac.part");
        let t = track(0, Some("Intro: Part 1"), Some("The Band"), 0, 90);

        let invocation = build_invocation(source, &t, false).unwrap();

        assert_eq!(invocation.output, PathBuf::from("/rips/01-Intro-_Part_1.flac"));
        assert_eq!(
            args_of(&invocation),
            vec![
                "--best",
                "--verify",
                "--silent",
                "--output-name=/rips/01-Intro-_Part_1.flac",
                "--tag=TITLE=Intro: Part 1",
                "--tag=ARTIST=The Band",
                "--until=01:30.000",
                "/rips/show.flac.part",
            ]
        );
    }

    #[test]
    fn test_last_track_omits_until() {
        let source = Path::new("/rips/show.flac");
        let t = track(11, Some("Encore"), None, 3000, 3300);

        let args = args_of(&build_invocation(source, &t, true).unwrap());

        assert!(args.contains(&"--skip=50:00.000".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--until")));
        assert!(!args.iter().any(|a| a.starts_with("--tag=ARTIST")));
        assert!(args.contains(&"--output-name=/rips/12-Encore.flac".to_string()));
    }

    #[test]
    fn test_missing_title_rejected() {
        let t = track(2, Some(""), None, 10, 20);
        assert!(matches!(
            build_invocation(Path::new("x.flac"), &t, false),
            Err(RescueError::MissingTitle { track: 3 })
        ));
    }

    #[test]
    fn test_relative_source_has_relative_output() {
        let t = track(0, Some("A"), None, 0, 1);
        assert_eq!(
            output_path(Path::new("x.flac"), &t).unwrap(),
            PathBuf::from("01-A.flac")
        );
    }

    #[test]
    fn test_export_tracks_continues_past_failures() {
        let tracks = vec![
            track(0, Some("One"), None, 0, 10),
            track(1, None, None, 10, 20),
            track(2, Some("Three"), None, 20, 30),
            track(3, Some("Four"), None, 30, 40),
            track(4, Some("Five"), None, 40, 50),
        ];
        let decisions = vec![
            ExportDecision::Intact,
            ExportDecision::Intact,
            ExportDecision::Damaged { region: 0 },
            ExportDecision::Intact,
            ExportDecision::Intact,
        ];
        let mut encoder = Recorder {
            fail_track: Some(4),
            ..Default::default()
        };

        let mut seen = Vec::new();
        let (outcomes, tally) = export_tracks(
            Path::new("x.flac"),
            &tracks,
            &decisions,
            &mut encoder,
            |t, _| seen.push(t.number()),
        );

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcomes.len(), 5);
        assert!(matches!(outcomes[1], ExportOutcome::Skipped(_)));
        assert!(matches!(outcomes[3], ExportOutcome::Failed(_)));
        assert_eq!(
            tally,
            ExportTally {
                recovered: 2,
                damaged: 1,
                skipped: 1,
                failed: 1,
                total: 5,
            }
        );
        // the final track runs to end of file
        let last = encoder.calls.last().unwrap();
        assert_eq!(last.track, 5);
        assert!(!args_of(last).iter().any(|a| a.starts_with("--until")));
    }
}
