// SPDX-License-Identifier: GPL-3.0-only

//! Events published by a scan session
//!
//! The scan loop never calls into presentation code. It pushes
//! [`ScanEvent`]s into an unbounded channel; the presentation context drains
//! the receiver on its own thread and forwards each event to a
//! [`PresentationSink`].

use super::content::QrContent;
use super::frame_loop::ExitReason;
use super::transform::PreviewImage;
use chrono::{DateTime, Local};
use futures::StreamExt;
use futures::channel::mpsc;
use tracing::trace;

/// A successful decode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub text: String,
    /// Value of the session's frame counter when the code was found
    pub frame_index: u64,
    pub decoded_at: DateTime<Local>,
}

impl DecodeResult {
    pub fn new(text: String, frame_index: u64) -> Self {
        Self {
            text,
            frame_index,
            decoded_at: Local::now(),
        }
    }

    /// Classify the payload
    pub fn content(&self) -> QrContent {
        QrContent::parse(&self.text)
    }
}

/// Human-readable session status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Opening the capture device
    Opening,
    /// Loop running
    Scanning,
    /// Device failed to open; the session stays idle
    DeviceUnavailable(String),
    /// Session ended
    Stopped(ExitReason),
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Opening => write!(f, "Opening camera"),
            ScanStatus::Scanning => write!(f, "Scanning for QR codes"),
            ScanStatus::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            ScanStatus::Stopped(reason) => write!(f, "Stopped: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Preview {
        frame_index: u64,
        image: PreviewImage,
    },
    Decoded(DecodeResult),
    Status(ScanStatus),
    /// The observable "is scanning" flag changed
    ScanningChanged(bool),
}

/// Receiving half, owned by the presentation context
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

/// Sending half shared by the session and its loop thread
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl EventSender {
    /// Queue an event without blocking. Events sent after the receiver is
    /// gone are dropped.
    pub fn publish(&self, event: ScanEvent) {
        if let Err(e) = self.tx.unbounded_send(event) {
            trace!(event = ?e.into_inner(), "Event receiver gone, dropping event");
        }
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded();
    (EventSender { tx }, rx)
}

/// Consumer of scan events, driven on the presentation context
pub trait PresentationSink {
    fn on_preview(&mut self, frame_index: u64, image: PreviewImage);

    fn on_decoded(&mut self, result: DecodeResult);

    fn on_status(&mut self, _status: ScanStatus) {}

    fn on_scanning_changed(&mut self, _scanning: bool) {}
}

/// Forward one event to the matching sink method
pub fn deliver<S: PresentationSink + ?Sized>(sink: &mut S, event: ScanEvent) {
    match event {
        ScanEvent::Preview { frame_index, image } => sink.on_preview(frame_index, image),
        ScanEvent::Decoded(result) => sink.on_decoded(result),
        ScanEvent::Status(status) => sink.on_status(status),
        ScanEvent::ScanningChanged(scanning) => sink.on_scanning_changed(scanning),
    }
}

/// Deliver events until the session reports it is no longer scanning
///
/// Returns `false` if the channel closed first.
pub async fn run_until_idle<S: PresentationSink + ?Sized>(
    receiver: &mut EventReceiver,
    sink: &mut S,
) -> bool {
    while let Some(event) = receiver.next().await {
        let finished = matches!(event, ScanEvent::ScanningChanged(false));
        deliver(sink, event);
        if finished {
            return true;
        }
    }
    false
}

/// Deliver whatever is queued right now without waiting
pub fn drain_pending<S: PresentationSink + ?Sized>(
    receiver: &mut EventReceiver,
    sink: &mut S,
) -> usize {
    let mut delivered = 0;
    while let Ok(event) = receiver.try_recv() {
        deliver(sink, event);
        delivered += 1;
    }
    delivered
}
