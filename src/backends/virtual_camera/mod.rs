// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera source
//!
//! Replays a single decoded image as an endless stream of frames, paced at
//! the requested frame rate. Lets the scan pipeline run against a file on
//! disk without any capture hardware.

use crate::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CaptureDevice, CaptureSpec,
    PixelFormat, RawFrame,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Backend serving frames from a still image
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    frame: RawFrame,
    source: String,
}

impl StillImageBackend {
    /// Load an image file (any format the `image` crate decodes)
    pub fn from_path(path: &Path) -> BackendResult<Self> {
        let image = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => BackendError::DeviceNotFound(format!(
                "{}: {}",
                path.display(),
                io
            )),
            other => BackendError::FormatNotSupported(format!("{}: {}", path.display(), other)),
        })?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        info!(path = %path.display(), width, height, "Loaded still image source");

        Ok(Self {
            frame: RawFrame::new(width, height, PixelFormat::RGB24, rgb.into_raw()),
            source: path.display().to_string(),
        })
    }

    /// Serve copies of an in-memory frame
    pub fn from_frame(frame: RawFrame) -> Self {
        Self {
            frame,
            source: "<memory>".to_string(),
        }
    }
}

impl CameraBackend for StillImageBackend {
    fn open(&self, spec: &CaptureSpec) -> BackendResult<Box<dyn CaptureDevice>> {
        if self.frame.is_empty() {
            return Err(BackendError::FormatNotSupported(format!(
                "{} contains no pixels",
                self.source
            )));
        }
        debug!(source = %self.source, request = %spec, "Opening still image device");
        Ok(Box::new(StillImageDevice {
            frame: self.frame.clone(),
            interval: spec.framerate.frame_duration(),
            last_read: None,
            sequence: 0,
            open: true,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }
}

struct StillImageDevice {
    frame: RawFrame,
    interval: Option<Duration>,
    last_read: Option<Instant>,
    sequence: u32,
    open: bool,
}

impl CaptureDevice for StillImageDevice {
    fn read_frame(&mut self) -> BackendResult<RawFrame> {
        if !self.open {
            return Err(BackendError::Released);
        }

        if let (Some(interval), Some(last)) = (self.interval, self.last_read) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());

        let mut frame = self.frame.clone();
        frame.sequence = Some(self.sequence);
        frame.captured_at = Instant::now();
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) {
        self.open = false;
    }
}
