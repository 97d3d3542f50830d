//! Frame-validity decoding for FLAC streams
//!
//! Frames are accepted on structure alone: a well-formed header with a
//! matching CRC-8, and an end position where the CRC-16 footer matches and the
//! next frame header (or end of file) begins. Subframes are never decoded.

use crate::constants::{
    bits_per_sample_from_code, block_size_from_code, sample_rate_from_code, BlockingStrategy,
    BLOCK_TYPE_STREAMINFO, FOOTER_SIZE, MAX_HEADER_SIZE, METADATA_HEADER_SIZE, MIN_HEADER_SIZE,
    READ_CHUNK, STREAMINFO_SIZE, STREAM_MARKER, SYNC_BYTE, SYNC_FIXED,
};
use crate::error::{FrameError, RescueError};
use crate::types::{Frame, FrameHeader, StreamInfo};
use crc::{Crc, CRC_16_UMTS, CRC_8_SMBUS};
use std::io::{Read, Seek, SeekFrom};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Header checksum: polynomial 0x07, initial value 0
pub(crate) const CRC_8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Footer checksum: polynomial 0x8005, initial value 0
pub(crate) const CRC_16: Crc<u16> = Crc::<u16>::new(&CRC_16_UMTS);

/// A source of frames with "next frame or failure" semantics
///
/// The decoder owns the byte source. Callers that need raw access (the
/// scanner's resynchronization) go through [`FrameDecoder::source_mut`]; the
/// next call to [`FrameDecoder::next_frame`] decodes from wherever the source
/// is positioned.
pub trait FrameDecoder {
    /// Underlying seekable byte source
    type Source: Read + Seek;

    /// Immutable per-file facts read at open time
    fn stream_info(&self) -> &StreamInfo;

    /// Decode the frame at the current position
    ///
    /// Returns `Ok(None)` at end of stream, `Err(RescueError::Frame(_))` when
    /// the bytes there do not form a valid frame, and any other error for I/O
    /// failures.
    fn next_frame(&mut self) -> Result<Option<Frame>, RescueError>;

    /// Raw access to the byte source
    fn source_mut(&mut self) -> &mut Self::Source;
}

/// FLAC frame decoder over any seekable reader
#[derive(Debug)]
pub struct FlacDecoder<R> {
    source: R,
    info: StreamInfo,
    buf: Vec<u8>,
}

impl<R: Read + Seek> FlacDecoder<R> {
    /// Read the stream marker and metadata, leaving the source at the first frame
    pub fn open(mut source: R) -> Result<Self, RescueError> {
        let mut marker = [0u8; 4];
        source.read_exact(&mut marker)?;
        if &marker != STREAM_MARKER {
            return Err(RescueError::NotFlac(marker));
        }

        let mut info = None;
        loop {
            let mut block_header = [0u8; METADATA_HEADER_SIZE];
            source.read_exact(&mut block_header)?;

            let is_last = block_header[0] & 0x80 != 0;
            let block_type = block_header[0] & 0x7F;
            let length = u32::from_be_bytes([0, block_header[1], block_header[2], block_header[3]]);

            match (info.is_some(), block_type) {
                (false, BLOCK_TYPE_STREAMINFO) => {
                    if (length as usize) < STREAMINFO_SIZE {
                        return Err(RescueError::InvalidStreamInfo(format!(
                            "block length {} is shorter than {}",
                            length, STREAMINFO_SIZE
                        )));
                    }
                    let mut body = vec![0u8; length as usize];
                    source.read_exact(&mut body)?;
                    info = Some(StreamInfo::from_bytes(&body)?);
                }
                (false, other) => {
                    return Err(RescueError::InvalidStreamInfo(format!(
                        "first metadata block has type {}, expected STREAMINFO",
                        other
                    )));
                }
                (true, 127) => {
                    return Err(RescueError::InvalidStreamInfo(
                        "metadata block type 127 is invalid".into(),
                    ));
                }
                (true, _other) => {
                    #[cfg(feature = "logging")]
                    trace!("Skipping metadata block type {} ({} bytes)", _other, length);

                    source.seek(SeekFrom::Current(i64::from(length)))?;
                }
            }

            if is_last {
                break;
            }
        }

        let info = info.ok_or_else(|| RescueError::InvalidStreamInfo("missing".into()))?;

        #[cfg(feature = "logging")]
        debug!(
            "Opened FLAC stream: {} Hz, {} channels, {} bits, block size {}..{}, {} samples",
            info.sample_rate,
            info.channels,
            info.bits_per_sample,
            info.min_block_size,
            info.max_block_size,
            info.total_samples
        );

        Ok(Self {
            source,
            info,
            buf: Vec::with_capacity(READ_CHUNK),
        })
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Append up to `want` bytes to the buffer; returns true at end of file
    fn read_more(&mut self, want: usize) -> std::io::Result<bool> {
        let got = self
            .source
            .by_ref()
            .take(want as u64)
            .read_to_end(&mut self.buf)?;
        Ok(got < want)
    }

    /// Reject headers that contradict STREAMINFO
    fn check_against_stream(&self, header: &FrameHeader, offset: u64) -> Result<(), FrameError> {
        if let Some(rate) = header.sample_rate {
            if rate != self.info.sample_rate {
                return Err(FrameError::InvalidHeader {
                    offset,
                    reason: format!(
                        "sample rate {} differs from stream rate {}",
                        rate, self.info.sample_rate
                    ),
                });
            }
        }
        if header.block_size > u32::from(self.info.max_block_size) {
            return Err(FrameError::InvalidHeader {
                offset,
                reason: format!(
                    "block size {} exceeds stream maximum {}",
                    header.block_size, self.info.max_block_size
                ),
            });
        }
        Ok(())
    }
}

impl<R: Read + Seek> FrameDecoder for FlacDecoder<R> {
    type Source = R;

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, RescueError> {
        let offset = self.source.stream_position()?;
        self.buf.clear();

        let mut eof = self.read_more(READ_CHUNK)?;
        if self.buf.is_empty() {
            return Ok(None);
        }

        let header = parse_frame_header(&self.buf, offset)?;
        self.check_against_stream(&header, offset)?;

        let limit = self.info.frame_size_limit();
        let mut cursor = header.length + FOOTER_SIZE;

        let size = loop {
            if let Some(end) = find_boundary(&self.buf, &mut cursor, eof, header.blocking) {
                break end;
            }
            if eof {
                if footer_matches(&self.buf) {
                    break self.buf.len();
                }
                return Err(FrameError::BoundaryNotFound {
                    offset,
                    searched: self.buf.len() as u64,
                }
                .into());
            }
            if self.buf.len() as u64 >= limit {
                return Err(FrameError::BoundaryNotFound {
                    offset,
                    searched: self.buf.len() as u64,
                }
                .into());
            }
            eof = self.read_more(READ_CHUNK)?;
        };

        self.source.seek(SeekFrom::Start(offset + size as u64))?;

        #[cfg(feature = "logging")]
        trace!(
            "Frame {} at offset {} ({} bytes, block size {})",
            header.number,
            offset,
            size,
            header.block_size
        );

        Ok(Some(Frame {
            header,
            offset,
            size: size as u64,
        }))
    }

    fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }
}

/// Find the first position after `cursor` where this frame can end
///
/// A frame ends where the CRC-16 over everything before the position checks
/// out and a header with the same blocking strategy starts. `cursor` is left
/// at the first position not yet examined so the search resumes after more
/// data is read.
fn find_boundary(
    buf: &[u8],
    cursor: &mut usize,
    eof: bool,
    blocking: BlockingStrategy,
) -> Option<usize> {
    while *cursor + 1 < buf.len() {
        let p = match memchr::memchr(SYNC_BYTE, &buf[*cursor..buf.len() - 1]) {
            Some(rel) => *cursor + rel,
            None => {
                *cursor = buf.len() - 1;
                return None;
            }
        };

        // Not enough bytes to judge this candidate yet
        if !eof && p + MAX_HEADER_SIZE > buf.len() {
            *cursor = p;
            return None;
        }

        let starts_frame = parse_frame_header(&buf[p..], 0)
            .map(|next| next.blocking == blocking)
            .unwrap_or(false);
        if starts_frame && footer_matches(&buf[..p]) {
            *cursor = p;
            return Some(p);
        }
        *cursor = p + 1;
    }
    None
}

/// Whether the last two bytes of `frame` are the CRC-16 of everything before them
pub fn footer_matches(frame: &[u8]) -> bool {
    if frame.len() < MIN_HEADER_SIZE + FOOTER_SIZE {
        return false;
    }
    let (body, footer) = frame.split_at(frame.len() - FOOTER_SIZE);
    CRC_16.checksum(body) == u16::from_be_bytes([footer[0], footer[1]])
}

/// Parse and checksum a frame header at the start of `data`
///
/// `offset` is only used to label errors.
pub fn parse_frame_header(data: &[u8], offset: u64) -> Result<FrameHeader, FrameError> {
    let need = |n: usize| {
        if data.len() < n {
            Err(FrameError::Truncated {
                offset,
                available: data.len(),
            })
        } else {
            Ok(())
        }
    };
    let invalid = |reason: &str| FrameError::InvalidHeader {
        offset,
        reason: reason.to_string(),
    };

    need(2)?;
    if data[0] != SYNC_BYTE || data[1] & 0xFE != SYNC_FIXED {
        return Err(FrameError::BadSync {
            offset,
            found: [data[0], data[1]],
        });
    }
    need(4)?;

    let blocking = BlockingStrategy::from_sync_byte(data[1]);
    let block_size_code = data[2] >> 4;
    let sample_rate_code = data[2] & 0x0F;
    let channel_assignment = data[3] >> 4;
    let sample_size_code = (data[3] >> 1) & 0x07;

    if block_size_code == 0 {
        return Err(invalid("reserved block size code 0"));
    }
    if sample_rate_code == 15 {
        return Err(invalid("invalid sample rate code 15"));
    }
    if channel_assignment > 10 {
        return Err(invalid("reserved channel assignment"));
    }
    if sample_size_code == 3 {
        return Err(invalid("reserved sample size code 3"));
    }
    if data[3] & 0x01 != 0 {
        return Err(invalid("reserved bit set"));
    }

    let mut pos = 4;
    let (number, used) = read_coded_number(&data[pos..], blocking, offset)?;
    pos += used;

    let block_size = match block_size_code {
        6 => {
            need(pos + 1)?;
            pos += 1;
            u32::from(data[pos - 1]) + 1
        }
        7 => {
            need(pos + 2)?;
            pos += 2;
            u32::from(u16::from_be_bytes([data[pos - 2], data[pos - 1]])) + 1
        }
        code => block_size_from_code(code).ok_or_else(|| invalid("invalid block size code"))?,
    };

    let sample_rate = match sample_rate_code {
        0 => None,
        12 => {
            need(pos + 1)?;
            pos += 1;
            Some(u32::from(data[pos - 1]) * 1000)
        }
        13 => {
            need(pos + 2)?;
            pos += 2;
            Some(u32::from(u16::from_be_bytes([data[pos - 2], data[pos - 1]])))
        }
        14 => {
            need(pos + 2)?;
            pos += 2;
            Some(u32::from(u16::from_be_bytes([data[pos - 2], data[pos - 1]])) * 10)
        }
        code => sample_rate_from_code(code),
    };

    need(pos + 1)?;
    let expected = data[pos];
    let actual = CRC_8.checksum(&data[..pos]);
    if expected != actual {
        return Err(FrameError::HeaderCrcMismatch {
            offset,
            expected,
            actual,
        });
    }

    Ok(FrameHeader {
        blocking,
        block_size,
        sample_rate,
        channel_assignment,
        bits_per_sample: bits_per_sample_from_code(sample_size_code),
        number,
        length: pos + 1,
    })
}

/// Decode the UTF-8-style coded frame or sample number
///
/// Fixed blocking allows up to 6 bytes (31 bits), variable up to 7 (36 bits).
fn read_coded_number(
    data: &[u8],
    blocking: BlockingStrategy,
    offset: u64,
) -> Result<(u64, usize), FrameError> {
    let truncated = || FrameError::Truncated {
        offset,
        available: data.len(),
    };
    let invalid = |reason: &str| FrameError::InvalidHeader {
        offset,
        reason: reason.to_string(),
    };

    let first = *data.first().ok_or_else(truncated)?;
    if first & 0x80 == 0 {
        return Ok((u64::from(first), 1));
    }

    let len = first.leading_ones() as usize;
    let max_len = match blocking {
        BlockingStrategy::Fixed => 6,
        BlockingStrategy::Variable => 7,
    };
    if len < 2 || len > max_len {
        return Err(invalid("malformed coded number"));
    }
    if data.len() < len {
        return Err(truncated());
    }

    let mut value = u64::from(first & (0x7F >> len));
    for &byte in &data[1..len] {
        if byte & 0xC0 != 0x80 {
            return Err(invalid("malformed coded number continuation"));
        }
        value = (value << 6) | u64::from(byte & 0x3F);
    }
    Ok((value, len))
}
