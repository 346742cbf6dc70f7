// SPDX-License-Identifier: GPL-3.0-only

//! QR scanning pipeline
//!
//! - [`session`]: start/stop state machine that owns the device lifecycle
//! - [`frame_loop`]: the capture/preview/decode loop
//! - [`transform`]: frame to preview and frame to decoder sample
//! - [`decoder`]: the QR decode capability
//! - [`events`]: channel between the loop and the presentation side
//! - [`content`]: classification of decoded payloads

pub mod content;
pub mod decoder;
pub mod events;
pub mod frame_loop;
pub mod session;
pub mod transform;

pub use content::{QrContent, WifiSecurity};
pub use decoder::{DecodeCapability, DecodeHints, QrDecoder};
pub use events::{
    DecodeResult, EventReceiver, EventSender, PresentationSink, ScanEvent, ScanStatus,
    drain_pending, run_until_idle,
};
pub use frame_loop::{ExitReason, LoopReport, LoopSettings, LoopStats, ScanLoop};
pub use session::{DecoderFactory, ScanSession, SessionState, StartOutcome, StopHandle};
pub use transform::{NormalizedSample, PreviewImage, SampleLayout};
