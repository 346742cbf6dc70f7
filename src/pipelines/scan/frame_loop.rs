// SPDX-License-Identifier: GPL-3.0-only

//! The scan loop
//!
//! One iteration pulls a frame, publishes a preview on every
//! `preview_interval`th valid frame, and runs the decoder on every valid
//! frame. The loop owns the [`DeviceLease`] outright and releases it when
//! [`ScanLoop::run`] returns, whatever the exit reason.
//!
//! Per-frame faults never end the loop. Reads that fail transiently and
//! faults from the transform or decoder pause for `retry_delay` and move on.

use super::decoder::DecodeCapability;
use super::events::{DecodeResult, EventSender, ScanEvent};
use super::transform;
use crate::backends::camera::{BackendError, DeviceLease, RawFrame};
use crate::config::ScannerConfig;
use crate::errors::{DecodeError, TransformError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Log sampled per-frame details every N frames
const LOG_EVERY: u64 = 30;

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Cancellation was signalled
    Cancelled,
    /// The device went away or was released underneath the loop
    SourceClosed,
    /// A code was decoded
    Decoded,
    /// The loop thread panicked
    Aborted,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Cancelled => write!(f, "cancelled"),
            ExitReason::SourceClosed => write!(f, "camera closed"),
            ExitReason::Decoded => write!(f, "code decoded"),
            ExitReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Outcome of a single iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Exit(ExitReason),
}

/// Fault in the per-frame work, absorbed by the loop
#[derive(Debug)]
enum FrameFault {
    Transform(TransformError),
    Decode(DecodeError),
}

impl From<TransformError> for FrameFault {
    fn from(e: TransformError) -> Self {
        FrameFault::Transform(e)
    }
}

impl From<DecodeError> for FrameFault {
    fn from(e: DecodeError) -> Self {
        FrameFault::Decode(e)
    }
}

/// Throttling and pacing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub preview_interval: u64,
    pub preview_quality: u8,
    pub sample_width: u32,
    pub sample_height: u32,
    /// Pause after every processed frame
    pub frame_interval: Duration,
    /// Pause after a failed read, an empty frame or a per-frame fault
    pub retry_delay: Duration,
}

impl From<&ScannerConfig> for LoopSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            preview_interval: config.preview_interval.max(1),
            preview_quality: config.preview_quality,
            sample_width: config.sample_width,
            sample_height: config.sample_height,
            frame_interval: config.frame_interval(),
            retry_delay: config.retry_delay(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

/// Counters kept by the loop thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub read_errors: u64,
    pub empty_frames: u64,
    pub previews: u64,
    pub preview_failures: u64,
    pub decode_attempts: u64,
    pub faults: u64,
}

/// What [`ScanLoop::run`] hands back once the device is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub reason: ExitReason,
    /// Valid frames processed
    pub frames: u64,
    pub stats: LoopStats,
}

pub struct ScanLoop {
    device: DeviceLease,
    decoder: Box<dyn DecodeCapability>,
    events: EventSender,
    cancel: Arc<AtomicBool>,
    settings: LoopSettings,
    frame_counter: u64,
    stats: LoopStats,
}

impl ScanLoop {
    pub fn new(
        device: DeviceLease,
        decoder: Box<dyn DecodeCapability>,
        events: EventSender,
        cancel: Arc<AtomicBool>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            device,
            decoder,
            events,
            cancel,
            settings,
            frame_counter: 0,
            stats: LoopStats::default(),
        }
    }

    /// Drive iterations until an exit condition, then release the device
    pub fn run(mut self) -> LoopReport {
        let started = Instant::now();
        info!(device = %self.device.label(), "Scan loop started");

        let reason = loop {
            match self.step() {
                LoopAction::Continue => {}
                LoopAction::Exit(reason) => break reason,
            }
        };

        let ScanLoop {
            device,
            frame_counter,
            stats,
            ..
        } = self;
        device.release();

        info!(
            reason = %reason,
            frames = frame_counter,
            elapsed_ms = started.elapsed().as_millis(),
            read_errors = stats.read_errors,
            faults = stats.faults,
            "Scan loop finished"
        );

        LoopReport {
            reason,
            frames: frame_counter,
            stats,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// One capture/transform/decode cycle
    pub fn step(&mut self) -> LoopAction {
        if self.cancelled() {
            debug!("Cancellation observed before read");
            return LoopAction::Exit(ExitReason::Cancelled);
        }
        if !self.device.is_open() {
            debug!("Capture device reports closed");
            return LoopAction::Exit(ExitReason::SourceClosed);
        }

        let frame = match self.device.read_frame() {
            Ok(frame) => frame,
            Err(e) => return self.on_read_error(e),
        };

        // stop() may have landed while the read was blocked
        if self.cancelled() {
            debug!("Cancellation observed after read, discarding frame");
            return LoopAction::Exit(ExitReason::Cancelled);
        }

        if frame.is_empty() {
            self.stats.empty_frames += 1;
            trace!(
                width = frame.width,
                height = frame.height,
                len = frame.data.len(),
                "Empty frame, retrying"
            );
            thread::sleep(self.settings.retry_delay);
            return LoopAction::Continue;
        }

        self.frame_counter += 1;
        let index = self.frame_counter;
        if index % LOG_EVERY == 0 {
            debug!(
                frame = index,
                width = frame.width,
                height = frame.height,
                format = %frame.format,
                "Scan loop progress"
            );
        }

        if index % self.settings.preview_interval == 0 {
            self.publish_preview(index, &frame);
        }

        match self.decode(&frame) {
            Ok(Some(text)) => {
                info!(frame = index, len = text.len(), "QR code decoded");
                self.events
                    .publish(ScanEvent::Decoded(DecodeResult::new(text, index)));
                return LoopAction::Exit(ExitReason::Decoded);
            }
            Ok(None) => {}
            Err(fault) => {
                self.stats.faults += 1;
                warn!(frame = index, fault = ?fault, "Frame processing failed, continuing");
                thread::sleep(self.settings.retry_delay);
                return LoopAction::Continue;
            }
        }

        thread::sleep(self.settings.frame_interval);
        LoopAction::Continue
    }

    fn on_read_error(&mut self, error: BackendError) -> LoopAction {
        if error.is_terminal() {
            warn!(error = %error, "Capture device closed");
            return LoopAction::Exit(ExitReason::SourceClosed);
        }

        self.stats.read_errors += 1;
        if self.stats.read_errors % LOG_EVERY == 1 {
            debug!(
                error = %error,
                count = self.stats.read_errors,
                "Frame read failed, retrying"
            );
        }
        thread::sleep(self.settings.retry_delay);
        LoopAction::Continue
    }

    /// Preview failures are logged and do not affect the decode of the same frame
    fn publish_preview(&mut self, index: u64, frame: &RawFrame) {
        match transform::to_preview(frame, self.settings.preview_quality) {
            Ok(image) => {
                self.stats.previews += 1;
                self.events.publish(ScanEvent::Preview {
                    frame_index: index,
                    image,
                });
            }
            Err(e) => {
                self.stats.preview_failures += 1;
                warn!(frame = index, error = %e, "Failed to render preview");
            }
        }
    }

    /// Transform and decode one frame
    ///
    /// A panic in either step is contained to this frame and reported as a
    /// decoder fault.
    fn decode(&mut self, frame: &RawFrame) -> Result<Option<String>, FrameFault> {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| -> Result<_, FrameFault> {
            let sample = transform::to_decode_sample(
                frame,
                self.settings.sample_width,
                self.settings.sample_height,
                self.decoder.sample_layout(),
            )?;
            self.stats.decode_attempts += 1;
            Ok(self.decoder.decode(&sample)?)
        }));

        attempt.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(error = %message, "QR decode panicked");
            Err(FrameFault::Decode(DecodeError::Failed(format!(
                "decoder panicked: {}",
                message
            ))))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
