//! Duration formatting for log lines and encoder arguments

use crate::constants::CD_FRAMES_PER_SECOND;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MILLI: u128 = 1_000_000;

/// Convert a sample count at `rate` Hz into a duration, exactly to the nanosecond
pub fn samples_to_duration(samples: u64, rate: u32) -> Duration {
    if rate == 0 {
        return Duration::ZERO;
    }
    let rate = u64::from(rate);
    let secs = samples / rate;
    let nanos = (u128::from(samples % rate) * NANOS_PER_SEC / u128::from(rate)) as u32;
    Duration::new(secs, nanos)
}

/// Convert a compact-disc frame count (75 per second) into a duration
pub fn cd_frames_to_duration(frames: u64) -> Duration {
    let secs = frames / CD_FRAMES_PER_SECOND;
    let rem = frames % CD_FRAMES_PER_SECOND;
    let nanos = (u128::from(rem) * NANOS_PER_SEC / u128::from(CD_FRAMES_PER_SECOND)) as u32;
    Duration::new(secs, nanos)
}

/// Format as `MM:SS.mmm`, rounded to the millisecond
///
/// This is the form `flac --skip/--until` accept.
pub fn fmt_time(d: Duration) -> String {
    let millis = (d.as_nanos() + NANOS_PER_MILLI / 2) / NANOS_PER_MILLI;
    let minutes = millis / 60_000;
    let rem = millis % 60_000;
    format!("{:02}:{:02}.{:03}", minutes, rem / 1000, rem % 1000)
}

/// Format as a cue-sheet timecode `MM:SS:FF` (75 frames per second)
pub fn fmt_cd_time(d: Duration) -> String {
    let per_sec = u128::from(CD_FRAMES_PER_SECOND);
    let frames = (d.as_nanos() * per_sec + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
    let minutes = frames / (per_sec * 60);
    let seconds = (frames / per_sec) % 60;
    format!("{:02}:{:02}:{:02}", minutes, seconds, frames % per_sec)
}
