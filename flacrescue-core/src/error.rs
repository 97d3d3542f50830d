//! Error types for flacrescue operations

use std::process::ExitStatus;

/// A single frame failed to decode
///
/// These are recoverable: the scanner answers them by resynchronizing.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The two bytes at the frame start are not a valid sync code
    #[error("Invalid frame sync at offset {offset}: {found:02X?}")]
    BadSync {
        /// Byte offset of the frame start
        offset: u64,
        /// The bytes found instead
        found: [u8; 2],
    },

    /// A header field holds a reserved or invalid value
    #[error("Invalid frame header at offset {offset}: {reason}")]
    InvalidHeader {
        /// Byte offset of the frame start
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// Header CRC-8 mismatch
    #[error("Header CRC-8 mismatch at offset {offset}: expected {expected:02x}, got {actual:02x}")]
    HeaderCrcMismatch {
        /// Byte offset of the frame start
        offset: u64,
        /// CRC stored in the header
        expected: u8,
        /// CRC computed over the header bytes
        actual: u8,
    },

    /// The stream ended inside a frame header
    #[error("Truncated frame header at offset {offset}: {available} bytes left")]
    Truncated {
        /// Byte offset of the frame start
        offset: u64,
        /// Bytes available before end of file
        available: usize,
    },

    /// No position with a matching CRC-16 footer was found
    #[error("No valid frame end found within {searched} bytes of offset {offset}")]
    BoundaryNotFound {
        /// Byte offset of the frame start
        offset: u64,
        /// How far the search went
        searched: u64,
    },
}

impl FrameError {
    /// Byte offset of the frame that failed
    pub fn offset(&self) -> u64 {
        match self {
            FrameError::BadSync { offset, .. }
            | FrameError::InvalidHeader { offset, .. }
            | FrameError::HeaderCrcMismatch { offset, .. }
            | FrameError::Truncated { offset, .. }
            | FrameError::BoundaryNotFound { offset, .. } => *offset,
        }
    }
}

/// Errors that can occur while diagnosing and exporting a capture
#[derive(thiserror::Error, Debug)]
pub enum RescueError {
    /// IO error during read/seek
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source does not start with the FLAC stream marker
    #[error("Not a FLAC stream: expected fLaC, got {0:02X?}")]
    NotFlac([u8; 4]),

    /// STREAMINFO missing or malformed
    #[error("Invalid STREAMINFO: {0}")]
    InvalidStreamInfo(String),

    /// Frame decode failure
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Raw byte scan hit end of file without finding another valid frame
    #[error("Resynchronization reached end of file (started at offset {from}); remainder is unrecoverable")]
    ResyncExhausted {
        /// Offset where the raw byte scan started
        from: u64,
    },

    /// Cue sheet could not be parsed
    #[error("Cue sheet error at line {line}: {message}")]
    CueParse {
        /// 1-based line number (0 when the sheet as a whole is at fault)
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Track has no title to build an output name from
    #[error("Track {track} has no title")]
    MissingTitle {
        /// 1-based track number
        track: usize,
    },

    /// The re-encoder could not be started
    #[error("Failed to start encoder for track {track}: {source}")]
    EncoderSpawn {
        /// 1-based track number
        track: usize,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The re-encoder exited unsuccessfully
    #[error("Encoder failed for track {track} ({status}): {stderr}")]
    EncoderFailed {
        /// 1-based track number
        track: usize,
        /// Exit status of the subprocess
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },
}

impl RescueError {
    /// Whether this error is a per-frame decode failure the scanner can resync past
    pub fn is_frame_error(&self) -> bool {
        matches!(self, RescueError::Frame(_))
    }
}
