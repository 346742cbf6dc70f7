// SPDX-License-Identifier: GPL-3.0-only

//! qrscan - scan QR codes from a V4L2 camera
//!
//! A capture device feeds a scan loop running on its own thread. The loop
//! publishes a grayscale preview every few frames, tries to decode a QR code
//! on every frame and stops as soon as one is found.
//!
//! # Architecture
//!
//! - [`backends`]: capture device abstraction (V4L2 and still images)
//! - [`pipelines`]: the scan session, loop, transforms and decoder
//! - [`config`]: user configuration handling
//! - [`constants`]: capture, timing and throttling defaults
//! - [`errors`]: error types
//!
//! # Example
//!
//! ```ignore
//! let (session, mut events) = ScanSession::new(get_backend(), ScannerConfig::default());
//! session.start()?;
//! pollster::block_on(run_until_idle(&mut events, &mut my_sink));
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;

// Re-export commonly used types
pub use backends::camera::{CameraBackend, CaptureDevice, CaptureSpec, RawFrame, get_backend};
pub use config::ScannerConfig;
pub use errors::{AppError, AppResult, SessionError};
pub use pipelines::scan::{
    DecodeResult, PresentationSink, QrContent, ScanEvent, ScanSession, StartOutcome,
    run_until_idle,
};
