// SPDX-License-Identifier: GPL-3.0-only

//! Frame transforms
//!
//! Pure conversions from a captured [`RawFrame`] into the two artifacts the
//! scan loop needs: a compressed grayscale preview for display and a small
//! normalized sample for the decoder. Both reject empty frames with
//! [`TransformError::EmptyFrame`] instead of panicking.

use crate::backends::camera::{PixelFormat, RawFrame};
use crate::errors::TransformError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbaImage};
use std::borrow::Cow;

pub type TransformResult<T> = Result<T, TransformError>;

/// Buffer layout a decoder consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleLayout {
    /// Single 8-bit luma plane
    #[default]
    Grayscale,
    /// Interleaved 8-bit RGBA, gray replicated into the color channels
    Rgba,
}

/// Resized grayscale sample packed for a decoder
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedSample {
    Grayscale(GrayImage),
    Rgba(RgbaImage),
}

impl NormalizedSample {
    pub fn layout(&self) -> SampleLayout {
        match self {
            NormalizedSample::Grayscale(_) => SampleLayout::Grayscale,
            NormalizedSample::Rgba(_) => SampleLayout::Rgba,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            NormalizedSample::Grayscale(img) => img.dimensions(),
            NormalizedSample::Rgba(img) => img.dimensions(),
        }
    }

    /// Luma view of the sample, borrowed when it is already grayscale
    pub fn luma(&self) -> Cow<'_, GrayImage> {
        match self {
            NormalizedSample::Grayscale(img) => Cow::Borrowed(img),
            NormalizedSample::Rgba(img) => {
                let (width, height) = img.dimensions();
                let luma = img
                    .pixels()
                    .map(|p| rec601_luma(p[0], p[1], p[2]))
                    .collect();
                Cow::Owned(GrayImage::from_raw(width, height, luma).unwrap_or_default())
            }
        }
    }
}

/// Grayscale JPEG rendered from a frame
#[derive(Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// JPEG bitstream
    pub jpeg: Vec<u8>,
}

impl std::fmt::Debug for PreviewImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PreviewImage({}x{}, {} bytes)",
            self.width,
            self.height,
            self.jpeg.len()
        )
    }
}

/// BT.601 luma in fixed point
fn rec601_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

/// Convert a frame of any supported pixel format into a tightly packed luma plane
///
/// Row padding is dropped. For YUYV the Y samples are taken directly.
pub fn to_luma(frame: &RawFrame) -> TransformResult<GrayImage> {
    if frame.is_empty() {
        return Err(TransformError::EmptyFrame);
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let row_bytes = frame.row_bytes();
    let mut luma = Vec::with_capacity(width * height);

    for row in frame.data.chunks(frame.stride as usize).take(height) {
        let pixels = &row[..row_bytes];
        match frame.format {
            PixelFormat::Gray8 => luma.extend_from_slice(pixels),
            PixelFormat::RGB24 => {
                luma.extend(pixels.chunks_exact(3).map(|p| rec601_luma(p[0], p[1], p[2])))
            }
            PixelFormat::RGBA => {
                luma.extend(pixels.chunks_exact(4).map(|p| rec601_luma(p[0], p[1], p[2])))
            }
            PixelFormat::YUYV => luma.extend(pixels.iter().step_by(2).copied()),
        }
    }

    GrayImage::from_raw(frame.width, frame.height, luma).ok_or(TransformError::EmptyFrame)
}

/// Render a grayscale JPEG preview at the frame's own resolution
pub fn to_preview(frame: &RawFrame, quality: u8) -> TransformResult<PreviewImage> {
    let luma = to_luma(frame)?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(&luma)?;

    Ok(PreviewImage {
        width: luma.width(),
        height: luma.height(),
        jpeg,
    })
}

/// Build the decoder input: grayscale, resized to `width`x`height` with
/// linear filtering, packed according to `layout`
pub fn to_decode_sample(
    frame: &RawFrame,
    width: u32,
    height: u32,
    layout: SampleLayout,
) -> TransformResult<NormalizedSample> {
    if width == 0 || height == 0 {
        return Err(TransformError::EmptyFrame);
    }

    let luma = to_luma(frame)?;
    let resized = if luma.dimensions() == (width, height) {
        luma
    } else {
        imageops::resize(&luma, width, height, FilterType::Triangle)
    };

    Ok(match layout {
        SampleLayout::Grayscale => NormalizedSample::Grayscale(resized),
        SampleLayout::Rgba => NormalizedSample::Rgba(DynamicImage::ImageLuma8(resized).to_rgba8()),
    })
}
