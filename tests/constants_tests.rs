// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use qrscan::constants::{self, capture, timing};

#[test]
fn test_capture_request() {
    assert_eq!((capture::WIDTH, capture::HEIGHT), (640, 480));
    assert_eq!(capture::FPS, 30);
}

#[test]
fn test_sample_smaller_than_capture() {
    // Decoding runs on a downscaled sample
    assert!(constants::DECODE_SAMPLE_WIDTH < capture::WIDTH);
    assert!(constants::DECODE_SAMPLE_HEIGHT < capture::HEIGHT);
    assert_eq!(
        constants::DECODE_SAMPLE_WIDTH * capture::HEIGHT,
        constants::DECODE_SAMPLE_HEIGHT * capture::WIDTH,
        "Sample keeps the capture aspect ratio"
    );
}

#[test]
fn test_timing_ordering() {
    // Retry back-off is shorter than the regular pacing, warm-up longest
    assert!(timing::RETRY_DELAY < timing::FRAME_INTERVAL);
    assert!(timing::FRAME_INTERVAL < timing::WARM_UP);
}

#[test]
fn test_preview_settings() {
    assert_eq!(constants::PREVIEW_INTERVAL, 6);
    assert!((1..=100).contains(&constants::PREVIEW_JPEG_QUALITY));
}
