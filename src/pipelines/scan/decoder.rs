// SPDX-License-Identifier: GPL-3.0-only

//! QR decode adapter
//!
//! Wraps the `rqrr` detector behind [`DecodeCapability`]. By default only a
//! single straight pass is made over each sample; the optional hints add
//! extra passes and trade latency for recall.

use super::transform::{NormalizedSample, SampleLayout};
use crate::errors::DecodeError;
use image::GrayImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

/// Extra decode passes, all off by default to bound per-frame latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeHints {
    /// Retry with the sample rotated by 90°
    pub auto_rotate: bool,
    /// Retry after stretching contrast to the full range
    pub try_harder: bool,
    /// Retry on the inverted image (light modules on dark background)
    pub try_inverted: bool,
}

/// Something that can turn a normalized sample into text
pub trait DecodeCapability: Send {
    /// Layout the transform should pack samples in
    fn sample_layout(&self) -> SampleLayout {
        SampleLayout::Grayscale
    }

    /// Decode a single sample
    ///
    /// Returns `Ok(None)` when no code is found, including for malformed or
    /// empty samples. `Err` is reserved for faults in the decoder itself.
    fn decode(&mut self, sample: &NormalizedSample) -> Result<Option<String>, DecodeError>;
}

/// QR-only decoder backed by `rqrr`
#[derive(Debug, Clone, Default)]
pub struct QrDecoder {
    hints: DecodeHints,
}

impl QrDecoder {
    pub fn new(hints: DecodeHints) -> Self {
        Self { hints }
    }

    pub fn hints(&self) -> DecodeHints {
        self.hints
    }
}

impl DecodeCapability for QrDecoder {
    fn decode(&mut self, sample: &NormalizedSample) -> Result<Option<String>, DecodeError> {
        let start = Instant::now();
        let luma = sample.luma();
        if luma.width() == 0 || luma.height() == 0 {
            return Ok(None);
        }

        let mut found = scan_luma(&luma);

        if found.is_none() && self.hints.try_harder {
            found = scan_luma(&stretch_contrast(&luma));
        }
        if found.is_none() && self.hints.try_inverted {
            let mut inverted = luma.clone().into_owned();
            imageops::invert(&mut inverted);
            found = scan_luma(&inverted);
        }
        if found.is_none() && self.hints.auto_rotate {
            found = scan_luma(&imageops::rotate90(&*luma));
        }

        trace!(
            elapsed_us = start.elapsed().as_micros(),
            found = found.is_some(),
            "QR decode pass complete"
        );
        Ok(found)
    }
}

/// Single detect + decode pass; first decodable grid wins
fn scan_luma(luma: &GrayImage) -> Option<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );

    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, content)) => {
                debug!(len = content.len(), "Decoded QR code");
                return Some(content);
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
            }
        }
    }
    None
}

/// Linear stretch of the luma range to 0..=255
fn stretch_contrast(luma: &GrayImage) -> GrayImage {
    let (min, max) = luma
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return luma.clone();
    }
    let range = (max - min) as u32;
    let mut out = luma.clone();
    for p in out.pixels_mut() {
        p[0] = ((p[0] - min) as u32 * 255 / range) as u8;
    }
    out
}
