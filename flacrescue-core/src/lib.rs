//! # flacrescue Core
//!
//! Diagnosis of partially corrupted FLAC captures: find where frames stop
//! decoding, map the lost audio onto cue-sheet tracks, and re-extract the
//! tracks that survived.
//!
//! ## Modules
//!
//! - `constants`: FLAC format constants and code tables
//! - `types`: Core types (StreamInfo, Frame, BadRegion, Track, ExportDecision)
//! - `decoder`: Frame-validity decoding with "next frame or failure" semantics
//! - `encoder`: Synthetic stream construction for tests and demos
//! - `scanner`: Forward scan with byte-level resynchronization
//! - `cue`: Minimal cue sheet reading
//! - `reconciler`: Single-pass bad-region/track classification
//! - `export`: Re-encoding of intact tracks
//! - `timefmt`: Duration formatting
//! - `sanitize`: Filesystem-safe track names

#![warn(missing_docs)]

pub mod constants;
pub mod cue;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod export;
pub mod reconciler;
pub mod sanitize;
pub mod scanner;
pub mod timefmt;
pub mod types;

// Re-export commonly used types
pub use error::{FrameError, RescueError};
pub use types::{BadRegion, ExportDecision, Frame, StreamInfo, Track};

/// Result type alias for flacrescue operations
pub type Result<T> = core::result::Result<T, RescueError>;
