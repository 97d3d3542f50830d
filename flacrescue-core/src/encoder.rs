//! Synthetic FLAC stream construction
//!
//! Builds structurally valid frames (header, opaque body, CRC-16 footer) and
//! whole streams around them. The body bytes are not real subframes; the
//! decoder only validates framing, so this is enough to exercise scanning and
//! resynchronization against known layouts.

use crate::constants::{
    block_size_from_code, sample_rate_from_code, BlockingStrategy, BLOCK_TYPE_STREAMINFO,
    STREAMINFO_SIZE, STREAM_MARKER, SYNC_BYTE,
};
use crate::decoder::{CRC_16, CRC_8};
use crate::error::RescueError;
use crate::types::StreamInfo;
use bytes::{BufMut, Bytes, BytesMut};
use std::ops::Range;

/// Metadata block type of PADDING
const BLOCK_TYPE_PADDING: u8 = 1;

/// Builder for a single frame
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    blocking: BlockingStrategy,
    number: u64,
    block_size: u32,
    sample_rate: Option<u32>,
    channel_assignment: u8,
    payload: Bytes,
}

impl FrameBuilder {
    /// Fixed-blocking frame with the given frame number
    pub fn new(frame_number: u64) -> Self {
        Self {
            blocking: BlockingStrategy::Fixed,
            number: frame_number,
            block_size: 4096,
            sample_rate: None,
            channel_assignment: 1,
            payload: Bytes::new(),
        }
    }

    /// Variable-blocking frame starting at the given sample number
    pub fn variable(sample_number: u64) -> Self {
        Self {
            blocking: BlockingStrategy::Variable,
            ..Self::new(sample_number)
        }
    }

    /// Samples per channel
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Write the sample rate into the header instead of deferring to STREAMINFO
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Opaque frame body
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Deterministic body of `len` bytes that never contains a sync byte
    pub fn payload_len(self, len: usize) -> Self {
        let seed = (self.number % 251) as usize;
        let body: Vec<u8> = (0..len).map(|i| ((seed + i) % 0xFF) as u8).collect();
        self.payload(body)
    }

    /// Encode the frame: header, CRC-8, body, CRC-16
    pub fn build(&self) -> Result<Bytes, RescueError> {
        let mut buf = BytesMut::with_capacity(16 + self.payload.len() + 2);

        let (block_size_code, block_size_tail) = encode_block_size(self.block_size)?;
        let (sample_rate_code, sample_rate_tail) = encode_sample_rate(self.sample_rate)?;

        buf.put_u8(SYNC_BYTE);
        buf.put_u8(self.blocking.sync_byte());
        buf.put_u8((block_size_code << 4) | sample_rate_code);
        // sample size code 0: defer to STREAMINFO
        buf.put_u8(self.channel_assignment << 4);
        encode_coded_number(self.number, self.blocking, &mut buf)?;
        buf.put_slice(&block_size_tail);
        buf.put_slice(&sample_rate_tail);

        let crc8 = CRC_8.checksum(&buf);
        buf.put_u8(crc8);

        buf.put_slice(&self.payload);

        let crc16 = CRC_16.checksum(&buf);
        buf.put_u16(crc16);

        Ok(buf.freeze())
    }
}

fn encode_block_size(block_size: u32) -> Result<(u8, Vec<u8>), RescueError> {
    if !(1..=65_536).contains(&block_size) {
        return Err(RescueError::InvalidStreamInfo(format!(
            "block size {} out of range",
            block_size
        )));
    }
    if let Some(code) = (1u8..=15).find(|&c| block_size_from_code(c) == Some(block_size)) {
        return Ok((code, Vec::new()));
    }
    let stored = block_size - 1;
    if stored <= 0xFF {
        Ok((6, vec![stored as u8]))
    } else {
        Ok((7, (stored as u16).to_be_bytes().to_vec()))
    }
}

fn encode_sample_rate(rate: Option<u32>) -> Result<(u8, Vec<u8>), RescueError> {
    let Some(rate) = rate else {
        return Ok((0, Vec::new()));
    };
    if let Some(code) = (1u8..=11).find(|&c| sample_rate_from_code(c) == Some(rate)) {
        return Ok((code, Vec::new()));
    }
    if rate % 1000 == 0 && rate / 1000 <= 0xFF {
        Ok((12, vec![(rate / 1000) as u8]))
    } else if rate <= 0xFFFF {
        Ok((13, (rate as u16).to_be_bytes().to_vec()))
    } else if rate % 10 == 0 && rate / 10 <= 0xFFFF {
        Ok((14, ((rate / 10) as u16).to_be_bytes().to_vec()))
    } else {
        Err(RescueError::InvalidStreamInfo(format!(
            "sample rate {} cannot be coded in a frame header",
            rate
        )))
    }
}

fn encode_coded_number(
    value: u64,
    blocking: BlockingStrategy,
    buf: &mut BytesMut,
) -> Result<(), RescueError> {
    if value < 0x80 {
        buf.put_u8(value as u8);
        return Ok(());
    }

    let max_len: u32 = match blocking {
        BlockingStrategy::Fixed => 6,
        BlockingStrategy::Variable => 7,
    };
    // An n-byte coded number carries 5n + 1 bits
    let len = (2..=max_len)
        .find(|&n| value < 1u64 << (5 * n + 1))
        .ok_or_else(|| {
            RescueError::InvalidStreamInfo(format!("frame number {} too large to code", value))
        })?;

    let prefix = !(0xFFu8 >> len);
    buf.put_u8(prefix | (value >> (6 * (len - 1))) as u8);
    for i in (0..len - 1).rev() {
        buf.put_u8(0x80 | ((value >> (6 * i)) & 0x3F) as u8);
    }
    Ok(())
}

/// Encode STREAMINFO into its 34-byte body
pub fn encode_stream_info(info: &StreamInfo) -> [u8; STREAMINFO_SIZE] {
    let mut body = [0u8; STREAMINFO_SIZE];
    body[0..2].copy_from_slice(&info.min_block_size.to_be_bytes());
    body[2..4].copy_from_slice(&info.max_block_size.to_be_bytes());
    body[4..7].copy_from_slice(&info.min_frame_size.to_be_bytes()[1..]);
    body[7..10].copy_from_slice(&info.max_frame_size.to_be_bytes()[1..]);

    let rate = info.sample_rate;
    let channels = info.channels.saturating_sub(1) & 0x07;
    let bps = info.bits_per_sample.saturating_sub(1) & 0x1F;
    body[10] = (rate >> 12) as u8;
    body[11] = (rate >> 4) as u8;
    body[12] = (((rate & 0x0F) as u8) << 4) | (channels << 1) | (bps >> 4);
    body[13] = ((bps & 0x0F) << 4) | ((info.total_samples >> 32) as u8 & 0x0F);
    body[14..18].copy_from_slice(&(info.total_samples as u32).to_be_bytes());
    // MD5 left zeroed ("not computed")
    body
}

/// A built stream with the byte range of every frame
#[derive(Debug, Clone)]
pub struct EncodedStream {
    /// Complete file contents
    pub bytes: Vec<u8>,

    /// Byte range of each frame, in stream order
    pub frame_ranges: Vec<Range<usize>>,
}

impl EncodedStream {
    /// Flip a body byte so the frame's CRC-16 no longer matches
    pub fn corrupt_frame(&mut self, index: usize) {
        let range = &self.frame_ranges[index];
        // last body byte sits just before the two footer bytes
        self.bytes[range.end - 3] ^= 0x01;
    }

    /// Overwrite a frame's sync code so its header is unrecognizable
    pub fn corrupt_header(&mut self, index: usize) {
        let start = self.frame_ranges[index].start;
        self.bytes[start] = 0x00;
    }

    /// Cut the stream short inside the given frame
    pub fn truncate_in_frame(&mut self, index: usize) {
        let range = self.frame_ranges[index].clone();
        let cut = range.start + (range.end - range.start) / 2;
        self.bytes.truncate(cut);
        self.frame_ranges.truncate(index);
    }
}

/// Builder for a complete FLAC stream
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    info: StreamInfo,
    padding: usize,
    frames: Vec<Bytes>,
}

impl StreamBuilder {
    /// Stream described by `info`
    pub fn new(info: StreamInfo) -> Self {
        Self {
            info,
            padding: 0,
            frames: Vec::new(),
        }
    }

    /// Add a PADDING metadata block of `len` bytes after STREAMINFO
    pub fn padding(mut self, len: usize) -> Self {
        self.padding = len;
        self
    }

    /// Append an already-built frame
    pub fn push_frame(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }

    /// Append `count` fixed-blocking frames numbered from 0 and build the stream
    pub fn fixed_frames(mut self, count: u64, payload_len: usize) -> Result<EncodedStream, RescueError> {
        let block_size = u32::from(self.info.min_block_size);
        for number in 0..count {
            let frame = FrameBuilder::new(number)
                .block_size(block_size)
                .payload_len(payload_len)
                .build()?;
            self.frames.push(frame);
        }
        Ok(self.build())
    }

    /// Concatenate marker, metadata and frames
    pub fn build(&self) -> EncodedStream {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(STREAM_MARKER);

        let info_is_last = self.padding == 0;
        bytes.push((if info_is_last { 0x80 } else { 0x00 }) | BLOCK_TYPE_STREAMINFO);
        bytes.extend_from_slice(&(STREAMINFO_SIZE as u32).to_be_bytes()[1..]);
        bytes.extend_from_slice(&encode_stream_info(&self.info));

        if !info_is_last {
            bytes.push(0x80 | BLOCK_TYPE_PADDING);
            bytes.extend_from_slice(&(self.padding as u32).to_be_bytes()[1..]);
            bytes.resize(bytes.len() + self.padding, 0);
        }

        let mut frame_ranges = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let start = bytes.len();
            bytes.extend_from_slice(frame);
            frame_ranges.push(start..bytes.len());
        }

        EncodedStream {
            bytes,
            frame_ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{footer_matches, parse_frame_header};

    #[test]
    fn test_frame_footer_valid() {
        let frame = FrameBuilder::new(7).payload_len(100).build().unwrap();
        assert!(footer_matches(&frame));
        assert_eq!(parse_frame_header(&frame, 0).unwrap().number, 7);
    }

    #[test]
    fn test_payload_never_contains_sync_byte() {
        let frame = FrameBuilder::new(3).payload_len(1000).build().unwrap();
        let header_len = parse_frame_header(&frame, 0).unwrap().length;
        let body = &frame[header_len..frame.len() - 2];
        assert!(!body.contains(&SYNC_BYTE));
    }

    #[test]
    fn test_large_coded_numbers() {
        let frame = FrameBuilder::variable((1 << 36) - 1).payload_len(4).build().unwrap();
        assert_eq!(parse_frame_header(&frame, 0).unwrap().number, (1 << 36) - 1);

        assert!(FrameBuilder::new(1 << 31).build().is_err());
        assert!(FrameBuilder::variable(1 << 36).build().is_err());
    }

    #[test]
    fn test_stream_info_round_trip() {
        let info = StreamInfo {
            min_block_size: 1152,
            max_block_size: 4608,
            min_frame_size: 14,
            max_frame_size: 12_345,
            sample_rate: 96_000,
            channels: 6,
            bits_per_sample: 24,
            total_samples: (1 << 33) + 17,
        };
        let body = encode_stream_info(&info);
        assert_eq!(StreamInfo::from_bytes(&body).unwrap(), info);
    }

    #[test]
    fn test_corrupt_frame_breaks_footer() {
        let info = StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 4096 * 3,
        };
        let mut stream = StreamBuilder::new(info).fixed_frames(3, 32).unwrap();
        let range = stream.frame_ranges[1].clone();
        assert!(footer_matches(&stream.bytes[range.clone()]));

        stream.corrupt_frame(1);
        assert!(!footer_matches(&stream.bytes[range]));
    }
}
