// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture
//!
//! Opens a `/dev/video*` node with the `v4l` crate, negotiates a format
//! close to the requested resolution and reads frames from a
//! memory-mapped buffer queue. MJPEG payloads are decoded to RGB on the
//! calling thread.

use super::types::*;
use super::{CameraBackend, CameraBackendType, CaptureDevice};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// Number of mmap buffers queued with the driver
const BUFFER_COUNT: u32 = 4;

/// Upper bound for a single blocking dequeue
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// FourCCs we can consume, most preferred first
const PREFERRED_FOURCCS: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"GREY"];

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus location reported by the driver
    pub bus: String,
}

/// List V4L2 nodes that support video capture
pub fn enumerate_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let dev = match Device::with_path(node.path()) {
            Ok(dev) => dev,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unopenable V4L2 node");
                continue;
            }
        };
        let caps = match dev.query_caps() {
            Ok(caps) => caps,
            Err(e) => {
                debug!(path = %path, error = %e, "VIDIOC_QUERYCAP failed");
                continue;
            }
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }
        devices.push(DeviceInfo {
            path,
            card: caps.card,
            driver: caps.driver,
            bus: caps.bus,
        });
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

/// V4L2 camera backend
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }

    fn resolve_path(spec: &CaptureSpec) -> BackendResult<String> {
        if let Some(path) = &spec.device {
            return Ok(path.clone());
        }
        enumerate_devices()
            .into_iter()
            .next()
            .map(|info| info.path)
            .ok_or_else(|| BackendError::DeviceNotFound("No V4L2 capture devices".to_string()))
    }
}

impl CameraBackend for V4l2Backend {
    fn open(&self, spec: &CaptureSpec) -> BackendResult<Box<dyn CaptureDevice>> {
        let path = Self::resolve_path(spec)?;
        info!(device = %path, request = %spec, "Opening V4L2 device");

        let dev = Device::with_path(&path)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path, e)))?;

        let negotiated = negotiate_format(&dev, spec)?;

        if let Err(e) = dev.set_params(&Parameters::with_fps(spec.framerate.num.max(1))) {
            warn!(error = %e, "Could not set frame interval, using driver default");
        }

        let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| BackendError::IoError(format!("Failed to create buffer stream: {}", e)))?;
        stream.set_timeout(READ_TIMEOUT);

        info!(
            device = %path,
            width = negotiated.width,
            height = negotiated.height,
            format = %negotiated.payload,
            "V4L2 capture stream ready"
        );

        Ok(Box::new(V4l2Device {
            path,
            stream: Some(stream),
            device: Some(dev),
            format: negotiated,
            frames_read: 0,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

/// Wire payload of the negotiated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Raw(PixelFormat),
    Mjpeg,
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Raw(format) => write!(f, "{}", format),
            Payload::Mjpeg => write!(f, "MJPG"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NegotiatedFormat {
    width: u32,
    height: u32,
    stride: u32,
    payload: Payload,
}

fn payload_for(fourcc: &[u8; 4]) -> Option<Payload> {
    if fourcc == b"MJPG" {
        return Some(Payload::Mjpeg);
    }
    PixelFormat::from_fourcc(fourcc).map(Payload::Raw)
}

fn negotiate_format(dev: &Device, spec: &CaptureSpec) -> BackendResult<NegotiatedFormat> {
    let mut format = dev
        .format()
        .map_err(|e| BackendError::IoError(format!("Failed to query format: {}", e)))?;

    for fourcc in PREFERRED_FOURCCS {
        format.width = spec.width;
        format.height = spec.height;
        format.fourcc = v4l::FourCC::new(fourcc);

        match dev.set_format(&format) {
            Ok(applied) if applied.fourcc.repr == *fourcc => {
                if let Some(payload) = payload_for(&applied.fourcc.repr) {
                    return Ok(NegotiatedFormat {
                        width: applied.width,
                        height: applied.height,
                        stride: applied.stride,
                        payload,
                    });
                }
            }
            Ok(applied) => {
                debug!(requested = ?fourcc, got = ?applied.fourcc, "Driver substituted format");
            }
            Err(e) => {
                debug!(requested = ?fourcc, error = %e, "Format rejected");
            }
        }
    }

    // Fall back to whatever the driver is currently producing
    let current = dev
        .format()
        .map_err(|e| BackendError::IoError(format!("Failed to query format: {}", e)))?;
    let payload = payload_for(&current.fourcc.repr).ok_or_else(|| {
        BackendError::FormatNotSupported(format!("Unsupported FourCC {}", current.fourcc))
    })?;

    Ok(NegotiatedFormat {
        width: current.width,
        height: current.height,
        stride: current.stride,
        payload,
    })
}

struct V4l2Device {
    path: String,
    stream: Option<MmapStream<'static>>,
    // Dropped after the stream
    device: Option<Device>,
    format: NegotiatedFormat,
    frames_read: u64,
}

impl V4l2Device {
    fn decode_payload(&self, payload: Vec<u8>, sequence: u32) -> BackendResult<RawFrame> {
        let captured_at = Instant::now();
        let mut frame = match self.format.payload {
            Payload::Raw(pixel_format) => {
                let stride = if self.format.stride == 0 {
                    self.format.width * pixel_format.bytes_per_pixel() as u32
                } else {
                    self.format.stride
                };
                RawFrame::new(self.format.width, self.format.height, pixel_format, payload)
                    .with_stride(stride)
            }
            Payload::Mjpeg => {
                let decoded = image::load_from_memory_with_format(&payload, image::ImageFormat::Jpeg)
                    .map_err(|e| BackendError::Other(format!("MJPEG decode failed: {}", e)))?
                    .to_rgb8();
                let (width, height) = decoded.dimensions();
                RawFrame::new(width, height, PixelFormat::RGB24, decoded.into_raw())
            }
        };
        frame.sequence = Some(sequence);
        frame.captured_at = captured_at;
        Ok(frame)
    }
}

impl CaptureDevice for V4l2Device {
    fn read_frame(&mut self) -> BackendResult<RawFrame> {
        let stream = self.stream.as_mut().ok_or(BackendError::Released)?;
        let (buf, meta) = stream.next().map_err(BackendError::from)?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used == 0 { buf } else { &buf[..used] };
        let sequence = meta.sequence;

        // Copy out before the buffer is re-queued on the next dequeue
        let payload = payload.to_vec();
        self.frames_read += 1;
        if self.frames_read % 60 == 0 {
            debug!(
                device = %self.path,
                frame = self.frames_read,
                sequence,
                bytes = payload.len(),
                "V4L2 frame captured"
            );
        }

        self.decode_payload(payload, sequence)
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            self.device.take();
            info!(device = %self.path, frames = self.frames_read, "V4L2 stream stopped");
        }
    }
}
