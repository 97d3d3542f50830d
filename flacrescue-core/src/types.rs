//! Core types shared by the scanner, reconciler and exporter

use crate::constants::{BlockingStrategy, FRAME_SIZE_SLACK, MAX_FRAME_SIZE, STREAMINFO_SIZE};
use crate::error::RescueError;
use crate::timefmt::samples_to_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-file facts from the STREAMINFO metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Minimum block size in samples (excluding the last frame)
    pub min_block_size: u16,

    /// Maximum block size in samples
    pub max_block_size: u16,

    /// Minimum frame size in bytes, 0 if unknown
    pub min_frame_size: u32,

    /// Maximum frame size in bytes, 0 if unknown
    pub max_frame_size: u32,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u8,

    /// Bits per sample
    pub bits_per_sample: u8,

    /// Total samples per channel, 0 if unknown
    pub total_samples: u64,
}

impl StreamInfo {
    /// Parse the 34-byte STREAMINFO body
    pub fn from_bytes(body: &[u8]) -> Result<Self, RescueError> {
        if body.len() < STREAMINFO_SIZE {
            return Err(RescueError::InvalidStreamInfo(format!(
                "block is {} bytes, expected {}",
                body.len(),
                STREAMINFO_SIZE
            )));
        }

        let min_block_size = u16::from_be_bytes([body[0], body[1]]);
        let max_block_size = u16::from_be_bytes([body[2], body[3]]);
        let min_frame_size = u32::from_be_bytes([0, body[4], body[5], body[6]]);
        let max_frame_size = u32::from_be_bytes([0, body[7], body[8], body[9]]);

        // 20 bits rate, 3 bits channels-1, 5 bits bps-1, 36 bits total samples
        let sample_rate =
            (u32::from(body[10]) << 12) | (u32::from(body[11]) << 4) | (u32::from(body[12]) >> 4);
        let channels = ((body[12] >> 1) & 0x07) + 1;
        let bits_per_sample = (((body[12] & 0x01) << 4) | (body[13] >> 4)) + 1;
        let total_samples = (u64::from(body[13] & 0x0F) << 32)
            | u64::from(u32::from_be_bytes([body[14], body[15], body[16], body[17]]));

        let info = StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
        };
        info.validate()?;
        Ok(info)
    }

    /// Check the fields the scanner relies on
    pub fn validate(&self) -> Result<(), RescueError> {
        if self.sample_rate == 0 {
            return Err(RescueError::InvalidStreamInfo("sample rate is 0".into()));
        }
        if self.min_block_size == 0 {
            return Err(RescueError::InvalidStreamInfo(
                "minimum block size is 0".into(),
            ));
        }
        if self.min_block_size > self.max_block_size {
            return Err(RescueError::InvalidStreamInfo(format!(
                "minimum block size {} exceeds maximum {}",
                self.min_block_size, self.max_block_size
            )));
        }
        Ok(())
    }

    /// Block size is fixed iff minimum and maximum agree
    pub fn has_fixed_block_size(&self) -> bool {
        self.min_block_size == self.max_block_size
    }

    /// Length of the whole stream
    pub fn total_duration(&self) -> Duration {
        samples_to_duration(self.total_samples, self.sample_rate)
    }

    /// Longest byte span a single frame may occupy
    ///
    /// Uses the recorded maximum frame size when present, otherwise the size of
    /// a verbatim (uncompressed) frame at the maximum block size.
    pub fn frame_size_limit(&self) -> u64 {
        if self.max_frame_size > 0 {
            return u64::from(self.max_frame_size) + FRAME_SIZE_SLACK;
        }
        let verbatim = u64::from(self.max_block_size)
            * u64::from(self.channels)
            * (u64::from(self.bits_per_sample) + 1)
            / 8;
        (verbatim + FRAME_SIZE_SLACK).min(MAX_FRAME_SIZE)
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Fixed or variable blocking
    pub blocking: BlockingStrategy,

    /// Samples per channel in this frame
    pub block_size: u32,

    /// Sample rate, `None` when the header defers to STREAMINFO
    pub sample_rate: Option<u32>,

    /// Raw channel assignment code (0..=10)
    pub channel_assignment: u8,

    /// Bits per sample, `None` when the header defers to STREAMINFO
    pub bits_per_sample: Option<u8>,

    /// Frame number (fixed blocking) or first sample number (variable blocking)
    pub number: u64,

    /// Header length in bytes, CRC-8 included
    pub length: usize,
}

/// A frame that passed header and footer validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Byte offset of the sync code
    pub offset: u64,

    /// Total size of the frame in bytes, footer included
    pub size: u64,
}

impl Frame {
    /// Position of the frame in the stream, counted in frames
    ///
    /// Variable-blocking headers carry a sample number instead, which is mapped
    /// back onto frames of the minimum block size.
    pub fn sequence_number(&self, info: &StreamInfo) -> u64 {
        match self.header.blocking {
            BlockingStrategy::Fixed => self.header.number,
            BlockingStrategy::Variable => self.header.number / u64::from(info.min_block_size.max(1)),
        }
    }

    /// Index of the first sample in this frame
    pub fn first_sample(&self, info: &StreamInfo) -> u64 {
        match self.header.blocking {
            BlockingStrategy::Fixed => self.header.number * u64::from(info.min_block_size),
            BlockingStrategy::Variable => self.header.number,
        }
    }

    /// Byte offset just past the frame footer
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }
}

/// Half-open stretch of audio lost between two good frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BadRegion {
    /// Start of the lost audio
    pub start: Duration,

    /// End of the lost audio (never before `start`)
    pub end: Duration,
}

impl BadRegion {
    /// Create a region, clamping `end` so it never precedes `start`
    pub fn new(start: Duration, end: Duration) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Length of the region
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the region covers a single instant
    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }
}

/// A named span of the stream taken from the cue sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// 0-based position in the track list
    pub index: usize,

    /// Track title, if the cue sheet gave one
    pub title: Option<String>,

    /// Performer, if known
    pub performer: Option<String>,

    /// Start of the track (INDEX 01)
    pub start: Duration,

    /// Start of the next track, or the stream length for the last one
    pub end: Duration,
}

impl Track {
    /// 1-based track number
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Title, treating an empty string as missing
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    /// Performer, treating an empty string as missing
    pub fn performer(&self) -> Option<&str> {
        self.performer.as_deref().filter(|p| !p.is_empty())
    }
}

/// Per-track classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExportDecision {
    /// No bad region touches the track
    Intact,
    /// The track overlaps the bad region at this index
    Damaged {
        /// Index into the bad-region list
        region: usize,
    },
}

impl ExportDecision {
    /// Whether the track can be re-extracted
    pub fn is_intact(&self) -> bool {
        matches!(self, ExportDecision::Intact)
    }
}
