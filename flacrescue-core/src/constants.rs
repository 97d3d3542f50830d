//! Constants and limits for the FLAC container

/// Stream marker at the very start of every FLAC file
pub const STREAM_MARKER: &[u8; 4] = b"fLaC";

/// Metadata block type of STREAMINFO (always the first block)
pub const BLOCK_TYPE_STREAMINFO: u8 = 0;

/// Size of the STREAMINFO block body in bytes
pub const STREAMINFO_SIZE: usize = 34;

/// Size of a metadata block header (last-flag + type, 24-bit length)
pub const METADATA_HEADER_SIZE: usize = 4;

/// First byte of every frame header
pub const SYNC_BYTE: u8 = 0xFF;

/// Second sync byte with the blocking-strategy bit clear (fixed block size)
pub const SYNC_FIXED: u8 = 0xF8;

/// Second sync byte with the blocking-strategy bit set (variable block size)
pub const SYNC_VARIABLE: u8 = 0xF9;

/// Smallest possible frame header: sync(2) + codes(2) + number(1) + crc8(1)
pub const MIN_HEADER_SIZE: usize = 6;

/// Largest possible frame header: sync(2) + codes(2) + number(7) + block size(2)
/// + sample rate(2) + crc8(1)
pub const MAX_HEADER_SIZE: usize = 16;

/// Size of the CRC-16 frame footer
pub const FOOTER_SIZE: usize = 2;

/// Frames per second in compact-disc timecodes (`MM:SS:FF`)
pub const CD_FRAMES_PER_SECOND: u64 = 75;

/// Upper bound used when STREAMINFO does not record a maximum frame size
pub const MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

/// Slack added to the computed verbatim frame bound (headers, padding bits)
pub const FRAME_SIZE_SLACK: u64 = 1024;

/// Chunk size used for forward reads while searching for a frame boundary
pub const READ_CHUNK: usize = 8 * 1024;

/// Chunk size used for raw byte reads while resynchronizing
pub const RESYNC_CHUNK: usize = 64 * 1024;

/// Blocking strategy of a frame, taken from the lowest bit of the second sync byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlockingStrategy {
    /// Every frame (but the last) has the same block size; header codes a frame number
    Fixed,
    /// Block size may change per frame; header codes the first sample number
    Variable,
}

impl BlockingStrategy {
    /// Strategy encoded by the second sync byte
    pub const fn from_sync_byte(byte: u8) -> Self {
        if byte & 0x01 == 0 {
            BlockingStrategy::Fixed
        } else {
            BlockingStrategy::Variable
        }
    }

    /// Second sync byte for this strategy
    pub const fn sync_byte(&self) -> u8 {
        match self {
            BlockingStrategy::Fixed => SYNC_FIXED,
            BlockingStrategy::Variable => SYNC_VARIABLE,
        }
    }
}

/// Block size for a 4-bit block size code
///
/// Codes 6 and 7 take the size from the end of the header and return `None` here,
/// as does the reserved code 0.
pub const fn block_size_from_code(code: u8) -> Option<u32> {
    match code {
        1 => Some(192),
        2..=5 => Some(576 << (code - 2)),
        8..=15 => Some(256 << (code - 8)),
        _ => None,
    }
}

/// Sample rate for a 4-bit sample rate code
///
/// Code 0 means "see STREAMINFO", codes 12 to 14 are read from the end of the
/// header and code 15 is invalid; all of those return `None`.
pub const fn sample_rate_from_code(code: u8) -> Option<u32> {
    match code {
        1 => Some(88_200),
        2 => Some(176_400),
        3 => Some(192_000),
        4 => Some(8_000),
        5 => Some(16_000),
        6 => Some(22_050),
        7 => Some(24_000),
        8 => Some(32_000),
        9 => Some(44_100),
        10 => Some(48_000),
        11 => Some(96_000),
        _ => None,
    }
}

/// Bits per sample for a 3-bit sample size code (0 means "see STREAMINFO")
pub const fn bits_per_sample_from_code(code: u8) -> Option<u8> {
    match code {
        1 => Some(8),
        2 => Some(12),
        4 => Some(16),
        5 => Some(20),
        6 => Some(24),
        7 => Some(32),
        _ => None,
    }
}
