// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    ScanSession      │  ← opens the device, hands the lease to the loop
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← open(spec) -> CaptureDevice
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌──────────┐
//!   │ V4L2 │  │  Still   │
//!   └──────┘  └──────────┘
//! ```

pub mod types;
pub mod v4l2;

pub use types::*;

use std::sync::Arc;
use tracing::{debug, info};

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraBackendType {
    /// Direct V4L2 capture
    #[default]
    V4l2,
    /// Frames replayed from a still image
    StillImage,
    /// Test or embedder-provided backend
    Custom,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::StillImage => write!(f, "still-image"),
            CameraBackendType::Custom => write!(f, "custom"),
        }
    }
}

/// Factory for capture devices
pub trait CameraBackend: Send + Sync {
    /// Open a device matching `spec` as closely as the hardware allows
    fn open(&self, spec: &CaptureSpec) -> BackendResult<Box<dyn CaptureDevice>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// An open capture device
///
/// Implementations are driven from a single thread at a time.
pub trait CaptureDevice: Send {
    /// Block until the next frame is available or the device fails
    fn read_frame(&mut self) -> BackendResult<RawFrame>;

    /// Whether the device can still produce frames
    fn is_open(&self) -> bool;

    /// Release the device. Must be idempotent.
    fn release(&mut self);
}

/// Exclusive ownership of an open device
///
/// Releasing consumes the lease, so nothing can read from a released device.
/// Dropping an unreleased lease releases it as well.
pub struct DeviceLease {
    device: Option<Box<dyn CaptureDevice>>,
    label: String,
}

impl DeviceLease {
    pub fn new(device: Box<dyn CaptureDevice>, label: impl Into<String>) -> Self {
        Self {
            device: Some(device),
            label: label.into(),
        }
    }

    pub fn read_frame(&mut self) -> BackendResult<RawFrame> {
        match self.device.as_mut() {
            Some(device) => device.read_frame(),
            None => Err(BackendError::Released),
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.as_ref().is_some_and(|device| device.is_open())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Release the underlying device
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!(device = %self.label, "Capture device released");
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if self.device.is_some() {
            debug!(device = %self.label, "DeviceLease dropped while open, releasing");
            self.release_inner();
        }
    }
}

impl std::fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLease")
            .field("label", &self.label)
            .field("held", &self.device.is_some())
            .finish()
    }
}

/// Get the default hardware backend
pub fn get_backend() -> Arc<dyn CameraBackend> {
    Arc::new(v4l2::V4l2Backend::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingDevice {
        releases: Arc<AtomicU32>,
    }

    impl CaptureDevice for CountingDevice {
        fn read_frame(&mut self) -> BackendResult<RawFrame> {
            Ok(RawFrame::new(1, 1, PixelFormat::Gray8, vec![0]))
        }

        fn is_open(&self) -> bool {
            true
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_lease_release_once() {
        let releases = Arc::new(AtomicU32::new(0));
        let lease = DeviceLease::new(
            Box::new(CountingDevice {
                releases: Arc::clone(&releases),
            }),
            "test",
        );
        assert!(lease.is_open());
        lease.release();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lease_drop_releases() {
        let releases = Arc::new(AtomicU32::new(0));
        {
            let mut lease = DeviceLease::new(
                Box::new(CountingDevice {
                    releases: Arc::clone(&releases),
                }),
                "test",
            );
            assert!(lease.read_frame().is_ok());
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
