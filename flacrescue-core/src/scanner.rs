//! Forward frame scan with byte-level resynchronization
//!
//! The scan runs as a two-state machine. While `Decoding`, frames are pulled
//! from the decoder one after another. A decode failure switches to
//! `Resynchronizing`: raw bytes after the failed frame are searched for the
//! frame sync pattern, and a decode is attempted at every match until one
//! succeeds. The time between the last good frame and the recovered one is
//! recorded as a [`BadRegion`].

use crate::constants::{BlockingStrategy, RESYNC_CHUNK, SYNC_BYTE};
use crate::decoder::FrameDecoder;
use crate::error::RescueError;
use crate::timefmt::samples_to_duration;
use crate::types::{BadRegion, Frame, StreamInfo};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

#[cfg(feature = "logging")]
use crate::timefmt::fmt_time;
#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Outcome of a complete scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Regions lost to corruption, in stream order
    pub bad_regions: Vec<BadRegion>,

    /// Frames that decoded successfully
    pub frames_decoded: u64,

    /// Sync pattern matches that did not decode
    pub false_syncs: u64,

    /// Bytes between failed frames and the frames recovered after them
    pub bytes_skipped: u64,

    /// One past the last sample of the furthest frame decoded
    pub end_sample: u64,
}

impl ScanReport {
    /// Length of the stream as far as it can be trusted
    ///
    /// STREAMINFO reports 0 samples for a capture that was never finalized,
    /// and may undercount one that kept growing; whichever of it and the
    /// decoded frames reaches further wins.
    pub fn stream_end(&self, info: &StreamInfo) -> Duration {
        samples_to_duration(info.total_samples.max(self.end_sample), info.sample_rate)
    }
}

/// Something the scan produced, in the order it was produced
#[derive(Debug, Clone, Copy)]
pub enum ScanEvent<'a> {
    /// A frame decoded successfully
    Frame(&'a Frame),
    /// A bad region was closed by a recovered frame
    BadRegion(&'a BadRegion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Decoding,
    Resynchronizing { failed_at: u64 },
}

/// Two bytes that begin every frame header of this stream
///
/// The second byte carries the blocking-strategy flag: clear when the block
/// size is fixed, set when STREAMINFO reports differing minimum and maximum.
pub fn sync_pattern(info: &StreamInfo) -> [u8; 2] {
    let blocking = if info.has_fixed_block_size() {
        BlockingStrategy::Fixed
    } else {
        BlockingStrategy::Variable
    };
    [SYNC_BYTE, blocking.sync_byte()]
}

/// Time lost between the last good frame and a recovered frame
///
/// Every skipped frame is assumed to hold the minimum block size; per-frame
/// sizes are unknowable once headers are lost.
pub fn bad_region_between(info: &StreamInfo, last_good: u64, recovered: u64) -> BadRegion {
    let block = u64::from(info.min_block_size);
    let start_sample = last_good.saturating_mul(block);
    let end_sample = recovered.saturating_sub(1).saturating_mul(block);
    BadRegion::new(
        samples_to_duration(start_sample, info.sample_rate),
        samples_to_duration(end_sample, info.sample_rate),
    )
}

/// Scan every frame of the stream and collect the bad regions
pub fn scan_frames<D: FrameDecoder>(decoder: &mut D) -> Result<ScanReport, RescueError> {
    scan_frames_with_observer(decoder, |_| {})
}

/// Scan every frame, reporting frames and bad regions to `observer` as they occur
///
/// Fails with [`RescueError::ResyncExhausted`] when the raw byte search runs
/// off the end of the file, and with any I/O error from the source.
pub fn scan_frames_with_observer<D, F>(
    decoder: &mut D,
    mut observer: F,
) -> Result<ScanReport, RescueError>
where
    D: FrameDecoder,
    F: FnMut(ScanEvent<'_>),
{
    let info = *decoder.stream_info();
    let pattern = sync_pattern(&info);
    let mut report = ScanReport::default();
    let mut last_good: u64 = 0;
    let mut state = ScanState::Decoding;

    #[cfg(feature = "logging")]
    debug!("Starting frame scan, sync pattern {:02X?}", pattern);

    loop {
        let frame = match state {
            ScanState::Decoding => {
                let at = decoder.source_mut().stream_position()?;
                match decoder.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(RescueError::Frame(_err)) => {
                        #[cfg(feature = "logging")]
                        warn!(
                            "Bad frame at offset {} (last good frame {}): {}",
                            at, last_good, _err
                        );

                        state = ScanState::Resynchronizing { failed_at: at };
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            ScanState::Resynchronizing { failed_at } => {
                let frame = resynchronize(decoder, pattern, failed_at, &mut report)?;
                let region = bad_region_between(&info, last_good, frame.sequence_number(&info));

                #[cfg(feature = "logging")]
                info!(
                    "bad region: {}-{} ({})",
                    fmt_time(region.start),
                    fmt_time(region.end),
                    fmt_time(region.duration())
                );

                observer(ScanEvent::BadRegion(&region));
                report.bad_regions.push(region);
                state = ScanState::Decoding;
                frame
            }
        };

        let sequence = frame.sequence_number(&info);
        if sequence < last_good {
            #[cfg(feature = "logging")]
            warn!(
                "Frame {} at offset {} is behind last good frame {}",
                sequence, frame.offset, last_good
            );
        }
        last_good = last_good.max(sequence);
        report.end_sample = report
            .end_sample
            .max(frame.first_sample(&info) + u64::from(frame.header.block_size));
        report.frames_decoded += 1;
        observer(ScanEvent::Frame(&frame));
    }

    #[cfg(feature = "logging")]
    debug!(
        "Scan complete: {} frames, {} bad regions, {} false syncs",
        report.frames_decoded,
        report.bad_regions.len(),
        report.false_syncs
    );

    Ok(report)
}

/// Search raw bytes after `failed_at` for the next frame that decodes
fn resynchronize<D: FrameDecoder>(
    decoder: &mut D,
    pattern: [u8; 2],
    failed_at: u64,
    report: &mut ScanReport,
) -> Result<Frame, RescueError> {
    let from = failed_at + 1;
    let mut pos = from;
    let mut chunk = Vec::with_capacity(RESYNC_CHUNK);

    loop {
        let source = decoder.source_mut();
        source.seek(SeekFrom::Start(pos))?;
        chunk.clear();
        source
            .by_ref()
            .take(RESYNC_CHUNK as u64)
            .read_to_end(&mut chunk)?;

        if chunk.len() < pattern.len() {
            return Err(RescueError::ResyncExhausted { from });
        }

        let Some(rel) = memchr::memmem::find(&chunk, &pattern) else {
            // the last byte may be the first half of a match
            pos += (chunk.len() - 1) as u64;
            continue;
        };

        let at = pos + rel as u64;
        decoder.source_mut().seek(SeekFrom::Start(at))?;
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                #[cfg(feature = "logging")]
                debug!(
                    "Resynchronized at offset {} ({} bytes after failure)",
                    at,
                    at - failed_at
                );

                report.bytes_skipped += at - failed_at;
                return Ok(frame);
            }
            Ok(None) => return Err(RescueError::ResyncExhausted { from }),
            Err(RescueError::Frame(_err)) => {
                #[cfg(feature = "logging")]
                debug!("False sync at offset {}: {}", at, _err);

                report.false_syncs += 1;
                pos = at + 1;
            }
            Err(e) => return Err(e),
        }
    }
}
