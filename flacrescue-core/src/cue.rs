//! Minimal cue sheet reading
//!
//! Only the records needed to cut a single-file capture into tracks are
//! understood: disc and track `TITLE`/`PERFORMER`, `TRACK` and `INDEX 01`.
//! Every other command is ignored.

use crate::error::RescueError;
use crate::timefmt::cd_frames_to_duration;
use crate::types::Track;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// A parsed cue sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSheet {
    /// Disc title
    pub title: Option<String>,

    /// Disc performer, inherited by tracks without their own
    pub performer: Option<String>,

    /// Tracks in sheet order
    pub tracks: Vec<CueTrack>,
}

/// One `TRACK` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueTrack {
    /// Track number as written in the sheet
    pub number: u32,

    /// Track title
    pub title: Option<String>,

    /// Track performer
    pub performer: Option<String>,

    /// Position of `INDEX 01`
    pub start: Duration,
}

impl CueSheet {
    /// Resolve tracks with their end positions
    ///
    /// Each track ends where the next begins; the last ends at `total`.
    pub fn tracks(&self, total: Duration) -> Vec<Track> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, cue_track)| {
                let end = self
                    .tracks
                    .get(index + 1)
                    .map(|next| next.start)
                    .unwrap_or(total)
                    .max(cue_track.start);
                Track {
                    index,
                    title: cue_track.title.clone(),
                    performer: cue_track.performer.clone().or_else(|| self.performer.clone()),
                    start: cue_track.start,
                    end,
                }
            })
            .collect()
    }
}

struct TrackDraft {
    number: u32,
    line: usize,
    title: Option<String>,
    performer: Option<String>,
    start: Option<Duration>,
}

/// Parse cue sheet text
pub fn parse_cue_sheet(text: &str) -> Result<CueSheet, RescueError> {
    let mut sheet = CueSheet::default();
    let mut drafts: Vec<TrackDraft> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_ascii_uppercase().as_str() {
            "TITLE" => {
                let value = unquote(rest);
                match drafts.last_mut() {
                    Some(track) => track.title = Some(value),
                    None => sheet.title = Some(value),
                }
            }
            "PERFORMER" => {
                let value = unquote(rest);
                match drafts.last_mut() {
                    Some(track) => track.performer = Some(value),
                    None => sheet.performer = Some(value),
                }
            }
            "TRACK" => {
                let number_text = rest.split_whitespace().next().unwrap_or("");
                let number = number_text.parse::<u32>().map_err(|_| RescueError::CueParse {
                    line: line_no,
                    message: format!("invalid track number {:?}", number_text),
                })?;
                drafts.push(TrackDraft {
                    number,
                    line: line_no,
                    title: None,
                    performer: None,
                    start: None,
                });
            }
            "INDEX" => {
                let mut parts = rest.split_whitespace();
                let index_no = parts.next().and_then(|n| n.parse::<u32>().ok());
                let time = parts.next().unwrap_or("");
                let Some(track) = drafts.last_mut() else {
                    return Err(RescueError::CueParse {
                        line: line_no,
                        message: "INDEX outside of a TRACK".into(),
                    });
                };
                let position = parse_cd_time(time).ok_or_else(|| RescueError::CueParse {
                    line: line_no,
                    message: format!("invalid INDEX time {:?}", time),
                })?;
                match index_no {
                    Some(1) => track.start = Some(position),
                    Some(_) => {}
                    None => {
                        return Err(RescueError::CueParse {
                            line: line_no,
                            message: "invalid INDEX number".into(),
                        })
                    }
                }
            }
            _other => {
                #[cfg(feature = "logging")]
                trace!("Ignoring cue command {} on line {}", _other, line_no);
            }
        }
    }

    if drafts.is_empty() {
        return Err(RescueError::CueParse {
            line: 0,
            message: "no tracks found".into(),
        });
    }

    let mut previous_start = Duration::ZERO;
    for draft in drafts {
        let start = draft.start.ok_or_else(|| RescueError::CueParse {
            line: draft.line,
            message: format!("track {} has no INDEX 01", draft.number),
        })?;
        if start < previous_start {
            return Err(RescueError::CueParse {
                line: draft.line,
                message: format!("track {} starts before the previous track", draft.number),
            });
        }
        previous_start = start;
        sheet.tracks.push(CueTrack {
            number: draft.number,
            title: draft.title,
            performer: draft.performer,
            start,
        });
    }

    #[cfg(feature = "logging")]
    debug!("Parsed cue sheet with {} tracks", sheet.tracks.len());

    Ok(sheet)
}

/// Read and parse a cue sheet file; invalid UTF-8 is replaced rather than rejected
pub fn read_cue_sheet(path: &Path) -> Result<CueSheet, RescueError> {
    let raw = fs::read(path)?;
    parse_cue_sheet(&String::from_utf8_lossy(&raw))
}

/// Cue sheet path that accompanies an audio file
///
/// A trailing `.flac.part` (in-progress capture) or bare `.part` is dropped and
/// `.cue` appended: `album.flac.part` maps to `album.cue`, while a finished
/// `album.flac` maps to `album.flac.cue`.
pub fn cue_path_for(audio: &Path) -> PathBuf {
    let name = audio.file_name().unwrap_or_default();
    let mut cue_name = match name.to_str() {
        Some(text) => OsString::from(
            text.strip_suffix(".flac.part")
                .or_else(|| text.strip_suffix(".part"))
                .unwrap_or(text),
        ),
        None => name.to_os_string(),
    };
    cue_name.push(".cue");
    audio.with_file_name(cue_name)
}

/// Find the cue sheet for an audio file on disk
///
/// Tries [`cue_path_for`] first, then the audio path with its extension
/// replaced (`album.flac` -> `album.cue`). When neither exists the first
/// candidate is returned so the caller's error names it.
pub fn locate_cue_sheet(audio: &Path) -> PathBuf {
    let primary = cue_path_for(audio);
    if primary.is_file() {
        return primary;
    }

    let stem = if audio.extension().is_some_and(|ext| ext == "part") {
        audio.with_extension("")
    } else {
        audio.to_path_buf()
    };
    let alternate = stem.with_extension("cue");
    if alternate != primary && alternate.is_file() {
        #[cfg(feature = "logging")]
        debug!("Using cue sheet {}", alternate.display());

        return alternate;
    }
    primary
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"') {
        Some(inner) => match inner.find('"') {
            Some(end) => inner[..end].to_string(),
            None => inner.to_string(),
        },
        None => value.to_string(),
    }
}

/// Parse `MM:SS:FF` (75 frames per second)
fn parse_cd_time(text: &str) -> Option<Duration> {
    let mut parts = text.split(':');
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let frames: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || seconds >= 60 || frames >= 75 {
        return None;
    }
    Some(cd_frames_to_duration((minutes * 60 + seconds) * 75 + frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"REM GENRE Rock
PERFORMER "The Band"
TITLE "Live Capture"
FILE "capture.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Opening"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Middle Song"
    PERFORMER "Guest Artist"
    INDEX 00 01:28:00
    INDEX 01 01:30:00
  TRACK 03 AUDIO
    TITLE "Closer"
    INDEX 01 03:00:00
"#;

    #[test]
    fn test_parse_sheet() {
        let sheet = parse_cue_sheet(SHEET).unwrap();

        assert_eq!(sheet.title.as_deref(), Some("Live Capture"));
        assert_eq!(sheet.performer.as_deref(), Some("The Band"));
        assert_eq!(sheet.tracks.len(), 3);
        assert_eq!(sheet.tracks[1].number, 2);
        assert_eq!(sheet.tracks[1].title.as_deref(), Some("Middle Song"));
        assert_eq!(sheet.tracks[1].start, Duration::from_secs(90));
        assert_eq!(sheet.tracks[2].start, Duration::from_secs(180));
    }

    #[test]
    fn test_tracks_derive_ends_and_performer() {
        let sheet = parse_cue_sheet(SHEET).unwrap();
        let tracks = sheet.tracks(Duration::from_secs(240));

        assert_eq!(tracks[0].end, Duration::from_secs(90));
        assert_eq!(tracks[1].end, Duration::from_secs(180));
        assert_eq!(tracks[2].end, Duration::from_secs(240));
        assert_eq!(tracks[0].performer.as_deref(), Some("The Band"));
        assert_eq!(tracks[1].performer.as_deref(), Some("Guest Artist"));
        assert_eq!(tracks[2].index, 2);
    }

    #[test]
    fn test_index_frames() {
        let sheet = parse_cue_sheet("TRACK 1 AUDIO\nINDEX 01 01:02:15\n").unwrap();
        assert_eq!(sheet.tracks[0].start, Duration::from_millis(62_200));
    }

    #[test]
    fn test_unquoted_values() {
        let sheet = parse_cue_sheet("TRACK 1 AUDIO\nTITLE Bare Title\nINDEX 01 00:00:00\n").unwrap();
        assert_eq!(sheet.tracks[0].title.as_deref(), Some("Bare Title"));
    }

    #[test]
    fn test_missing_index01_is_error() {
        let err = parse_cue_sheet("TRACK 01 AUDIO\n  INDEX 00 00:00:00\n").unwrap_err();
        assert!(matches!(err, RescueError::CueParse { line: 1, .. }));
    }

    #[test]
    fn test_bad_time_is_error() {
        let err = parse_cue_sheet("TRACK 01 AUDIO\n  INDEX 01 00:61:00\n").unwrap_err();
        assert!(matches!(err, RescueError::CueParse { line: 2, .. }));
    }

    #[test]
    fn test_no_tracks_is_error() {
        assert!(parse_cue_sheet("TITLE \"Empty\"\n").is_err());
    }

    #[test]
    fn test_backwards_track_is_error() {
        let text = "TRACK 01 AUDIO\nINDEX 01 02:00:00\nTRACK 02 AUDIO\nINDEX 01 01:00:00\n";
        assert!(matches!(
            parse_cue_sheet(text),
            Err(RescueError::CueParse { line: 3, .. })
        ));
    }

    #[test]
    fn test_cue_path_for() {
        assert_eq!(
            cue_path_for(Path::new("/rips/album.flac.part")),
            PathBuf::from("/rips/album.cue")
        );
        assert_eq!(
            cue_path_for(Path::new("/rips/album.flac")),
            PathBuf::from("/rips/album.flac.cue")
        );
        assert_eq!(
            cue_path_for(Path::new("/rips/album.part")),
            PathBuf::from("/rips/album.cue")
        );
        assert_eq!(cue_path_for(Path::new("album")), PathBuf::from("album.cue"));
    }

    #[test]
    fn test_locate_cue_sheet_falls_back_to_replaced_extension() {
        let td = tempfile::tempdir().unwrap();
        let dir = td.path();
        let audio = dir.join("album.flac");

        // nothing on disk: the primary name is reported
        assert_eq!(locate_cue_sheet(&audio), dir.join("album.flac.cue"));

        fs::write(dir.join("album.cue"), "").unwrap();
        assert_eq!(locate_cue_sheet(&audio), dir.join("album.cue"));

        fs::write(dir.join("album.flac.cue"), "").unwrap();
        assert_eq!(locate_cue_sheet(&audio), dir.join("album.flac.cue"));
    }
}
