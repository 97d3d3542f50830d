//! Fuzz entry points for the flacrescue-core frame decoder and scanner
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Call these from fuzz targets over arbitrary input

use flacrescue_core::decoder::{parse_frame_header, FlacDecoder, FrameDecoder};
use flacrescue_core::encoder::StreamBuilder;
use flacrescue_core::scanner::scan_frames;
use flacrescue_core::StreamInfo;
use std::io::Cursor;

/// STREAMINFO placed in front of fuzzed frame data
fn fuzz_stream_info() -> StreamInfo {
    StreamInfo {
        min_block_size: 4096,
        max_block_size: 4096,
        min_frame_size: 0,
        max_frame_size: 0,
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
        total_samples: 0,
    }
}

/// Wrap raw frame bytes in a valid stream prefix so fuzzing reaches frame parsing
fn with_stream_prefix(data: &[u8]) -> Vec<u8> {
    let mut bytes = StreamBuilder::new(fuzz_stream_info()).build().bytes;
    bytes.extend_from_slice(data);
    bytes
}

/// Decode a whole file, header included; must never panic
pub fn fuzz_decode(data: &[u8]) {
    let _ = parse_frame_header(data, 0);

    if let Ok(mut decoder) = FlacDecoder::open(Cursor::new(data)) {
        while let Ok(Some(_)) = decoder.next_frame() {}
    }
}

/// Scan fuzzed frame data behind a valid stream header; must never panic
pub fn fuzz_scan(data: &[u8]) {
    let stream = with_stream_prefix(data);
    if let Ok(mut decoder) = FlacDecoder::open(Cursor::new(stream.as_slice())) {
        let _ = scan_frames(&mut decoder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzz_decode_empty() {
        fuzz_decode(&[]);
    }

    #[test]
    fn test_fuzz_decode_random() {
        fuzz_decode(&[0x66, 0x4C, 0x61, 0x43, 0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_fuzz_scan_empty() {
        fuzz_scan(&[]);
    }

    #[test]
    fn test_fuzz_scan_sync_flood() {
        fuzz_scan(&[0xFF; 1024]);
        fuzz_scan(&[0xFF, 0xF8].repeat(512));
    }

    #[test]
    fn test_fuzz_scan_valid_prefix() {
        let stream = StreamBuilder::new(StreamInfo {
            total_samples: 4096 * 4,
            ..fuzz_stream_info()
        })
        .fixed_frames(4, 16)
        .unwrap();
        fuzz_scan(&stream.bytes[stream.frame_ranges[0].start..]);
    }
}
