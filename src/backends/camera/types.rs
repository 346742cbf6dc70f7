// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Time between two frames at this rate
    ///
    /// A zero rate yields `None` (free-running source).
    pub fn frame_duration(&self) -> Option<std::time::Duration> {
        if self.num == 0 {
            return None;
        }
        Some(std::time::Duration::from_secs_f64(
            self.denom as f64 / self.num as f64,
        ))
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Capability request used when opening a capture device
///
/// Devices are free to approximate the requested resolution and rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    /// Device path (e.g. `/dev/video0`); `None` picks the first capture device
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
}

impl std::fmt::Display for CaptureSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{} @ {}fps",
            self.device.as_deref().unwrap_or("<default>"),
            self.width,
            self.height,
            self.framerate
        )
    }
}

/// Pixel layout of a raw frame as delivered by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
}

impl PixelFormat {
    /// Bytes occupied by one pixel in a row
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::YUYV => 2,
            Self::RGB24 => 3,
            Self::RGBA => 4,
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" | b"Y800" => Some(Self::Gray8),
            b"RGB3" => Some(Self::RGB24),
            b"AB24" | b"RGBA" => Some(Self::RGBA),
            b"YUYV" => Some(Self::YUYV),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gray8 => "GRAY8",
            Self::RGB24 => "RGB24",
            Self::RGBA => "RGBA",
            Self::YUYV => "YUYV",
        };
        f.write_str(name)
    }
}

/// A single frame from the camera
///
/// Owned by the loop iteration that captured it. Consumers that need pixel
/// data beyond the iteration must copy it out.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub data: Vec<u8>,
    /// Driver sequence number, if the backend reports one
    pub sequence: Option<u32>,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl RawFrame {
    /// Create a tightly packed frame
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            // Saturates for absurd widths; is_empty() then rejects the frame
            stride: width.saturating_mul(format.bytes_per_pixel() as u32),
            data,
            sequence: None,
            captured_at: Instant::now(),
        }
    }

    /// Override the row stride for buffers with per-row padding
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Bytes of pixel data in one row, excluding padding
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// True for zero-dimension frames and frames whose buffer is too short
    /// to hold `height` rows at the declared stride
    pub fn is_empty(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return true;
        }
        let stride = self.stride as usize;
        if stride < self.row_bytes() {
            return true;
        }
        let needed = (self.height as usize - 1)
            .checked_mul(stride)
            .and_then(|rows| rows.checked_add(self.row_bytes()));
        needed.is_none_or(|needed| self.data.len() < needed)
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Device went away; no further frames will arrive
    Disconnected,
    /// Device was already released
    Released,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl BackendError {
    /// Errors after which the device can never produce another frame
    pub fn is_terminal(&self) -> bool {
        matches!(self, BackendError::Disconnected | BackendError::Released)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::Released => write!(f, "Camera already released"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            // ENODEV / ENXIO: the device node disappeared
            Some(19) | Some(6) => BackendError::Disconnected,
            _ => BackendError::IoError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_empty_detection() {
        assert!(RawFrame::new(0, 10, PixelFormat::Gray8, vec![0; 10]).is_empty());
        assert!(RawFrame::new(4, 4, PixelFormat::Gray8, Vec::new()).is_empty());
        assert!(RawFrame::new(4, 4, PixelFormat::RGB24, vec![0; 47]).is_empty());
        assert!(!RawFrame::new(4, 4, PixelFormat::RGB24, vec![0; 48]).is_empty());
    }

    #[test]
    fn test_oversized_width_is_empty_not_overflow() {
        // A broken source reporting a huge width must not wrap the stride
        let frame = RawFrame::new(u32::MAX / 2, 2, PixelFormat::RGBA, vec![0; 64]);
        assert_eq!(frame.stride, u32::MAX);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_padded_last_row_may_be_short() {
        // 2 rows of 3 bytes, stride 5; last row needs no padding
        let frame = RawFrame::new(3, 2, PixelFormat::Gray8, vec![0; 8]).with_stride(5);
        assert!(!frame.is_empty());

        let bad = RawFrame::new(3, 2, PixelFormat::Gray8, vec![0; 8]).with_stride(2);
        assert!(bad.is_empty());
    }

    #[test]
    fn test_fourcc_parsing() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::YUYV));
        assert_eq!(PixelFormat::from_fourcc(b"GREY"), Some(PixelFormat::Gray8));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }

    #[test]
    fn test_framerate_duration() {
        let fps = Framerate::from_int(25);
        assert_eq!(fps.frame_duration().map(|d| d.as_millis()), Some(40));
        assert_eq!(Framerate::from_int(0).frame_duration(), None);
        assert_eq!(Framerate::new(30, 0).denom, 1);
    }

    #[test]
    fn test_terminal_errors() {
        assert!(BackendError::Disconnected.is_terminal());
        assert!(BackendError::Released.is_terminal());
        assert!(!BackendError::IoError("EAGAIN".into()).is_terminal());
    }
}
