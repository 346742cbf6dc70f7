// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests: a scripted camera backend and a
//! decoder that "finds" a code in bright frames.

#![allow(dead_code)]

use qrscan::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CaptureDevice, CaptureSpec,
    PixelFormat, RawFrame,
};
use qrscan::config::ScannerConfig;
use qrscan::errors::DecodeError;
use qrscan::pipelines::scan::{DecodeCapability, EventReceiver, NormalizedSample, ScanEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const FRAME_WIDTH: u32 = 32;
pub const FRAME_HEIGHT: u32 = 24;

/// Luma of an ordinary frame
pub const DARK: u8 = 40;
/// Luma the marker decoder recognises
pub const BRIGHT: u8 = 250;

pub const MARKER_TEXT: &str = "https://example.org/marker";

/// One scripted read result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Frame with no code
    Plain,
    /// Frame the marker decoder decodes
    Marker,
    /// Zero-size frame
    Empty,
    /// Transient read failure
    Error,
    /// Device unplugged
    Closed,
    /// Driver bug: the read itself panics
    Panic,
}

/// Counters shared between a backend and every device it opens
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub opens: AtomicU32,
    pub reads: AtomicU32,
    pub releases: AtomicU32,
    pub reads_after_release: AtomicU32,
}

impl DeviceLog {
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn reads_after_release(&self) -> u32 {
        self.reads_after_release.load(Ordering::SeqCst)
    }
}

/// Backend whose devices replay a fixed script, then plain frames forever
pub struct ScriptedBackend {
    script: Vec<Step>,
    read_delay: Duration,
    pub fail_open: AtomicBool,
    pub log: Arc<DeviceLog>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Self::with_read_delay(script, Duration::ZERO)
    }

    /// Every read blocks for `read_delay` like a real device waiting on a frame
    pub fn with_read_delay(script: Vec<Step>, read_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            read_delay,
            fail_open: AtomicBool::new(false),
            log: Arc::new(DeviceLog::default()),
        })
    }

    pub fn unplugged() -> Arc<Self> {
        let backend = Self::new(Vec::new());
        backend.fail_open.store(true, Ordering::SeqCst);
        backend
    }
}

impl CameraBackend for ScriptedBackend {
    fn open(&self, _spec: &CaptureSpec) -> BackendResult<Box<dyn CaptureDevice>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(BackendError::DeviceNotFound("/dev/video-test".into()));
        }
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDevice {
            script: self.script.iter().copied().collect(),
            read_delay: self.read_delay,
            log: Arc::clone(&self.log),
            released: false,
            unplugged: false,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Custom
    }
}

struct ScriptedDevice {
    script: VecDeque<Step>,
    read_delay: Duration,
    log: Arc<DeviceLog>,
    released: bool,
    unplugged: bool,
}

fn gray_frame(value: u8) -> RawFrame {
    RawFrame::new(
        FRAME_WIDTH,
        FRAME_HEIGHT,
        PixelFormat::Gray8,
        vec![value; (FRAME_WIDTH * FRAME_HEIGHT) as usize],
    )
}

impl CaptureDevice for ScriptedDevice {
    fn read_frame(&mut self) -> BackendResult<RawFrame> {
        self.log.reads.fetch_add(1, Ordering::SeqCst);
        if self.released {
            self.log.reads_after_release.fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::Released);
        }
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }

        match self.script.pop_front().unwrap_or(Step::Plain) {
            Step::Plain => Ok(gray_frame(DARK)),
            Step::Marker => Ok(gray_frame(BRIGHT)),
            Step::Empty => Ok(RawFrame::new(0, 0, PixelFormat::Gray8, Vec::new())),
            Step::Error => Err(BackendError::IoError("VIDIOC_DQBUF timed out".into())),
            Step::Closed => {
                self.unplugged = true;
                Err(BackendError::Disconnected)
            }
            Step::Panic => panic!("driver returned a corrupt buffer"),
        }
    }

    fn is_open(&self) -> bool {
        !self.released && !self.unplugged
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Decodes [`MARKER_TEXT`] from any sample whose mean luma exceeds 200
#[derive(Clone, Default)]
pub struct MarkerDecoder {
    pub attempts: Arc<AtomicU32>,
    /// Attempt numbers (1-based) that fail with a decoder fault
    pub fail_on: Arc<Mutex<Vec<u32>>>,
    /// Attempt numbers (1-based) that panic inside the decoder
    pub panic_on: Arc<Mutex<Vec<u32>>>,
}

impl MarkerDecoder {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_on(self, attempts: &[u32]) -> Self {
        if let Ok(mut fail_on) = self.fail_on.lock() {
            fail_on.extend_from_slice(attempts);
        }
        self
    }

    pub fn panic_on(self, attempts: &[u32]) -> Self {
        if let Ok(mut panic_on) = self.panic_on.lock() {
            panic_on.extend_from_slice(attempts);
        }
        self
    }
}

impl DecodeCapability for MarkerDecoder {
    fn decode(&mut self, sample: &NormalizedSample) -> Result<Option<String>, DecodeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.lock().unwrap().contains(&attempt) {
            return Err(DecodeError::Failed(format!("injected fault #{}", attempt)));
        }
        if self.panic_on.lock().unwrap().contains(&attempt) {
            panic!("decoder crashed on attempt {}", attempt);
        }

        let luma = sample.luma();
        let pixels = luma.as_raw();
        if pixels.is_empty() {
            return Ok(None);
        }
        let mean = pixels.iter().map(|&p| p as u64).sum::<u64>() / pixels.len() as u64;
        Ok((mean > 200).then(|| MARKER_TEXT.to_string()))
    }
}

/// Config with no warm-up and millisecond pacing
pub fn fast_config() -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.timing.warm_up_ms = 0;
    config.timing.frame_interval_ms = 1;
    config.timing.retry_delay_ms = 1;
    config.sample_width = 16;
    config.sample_height = 12;
    config
}

/// Everything queued on the receiver right now
pub fn drain(rx: &mut EventReceiver) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn preview_indices(events: &[ScanEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            ScanEvent::Preview { frame_index, .. } => Some(*frame_index),
            _ => None,
        })
        .collect()
}

pub fn decoded(events: &[ScanEvent]) -> Vec<(u64, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            ScanEvent::Decoded(result) => Some((result.frame_index, result.text.clone())),
            _ => None,
        })
        .collect()
}
