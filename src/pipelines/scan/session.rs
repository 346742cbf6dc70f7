// SPDX-License-Identifier: GPL-3.0-only

//! Scan session controller
//!
//! ```text
//!            start()             warm-up done
//!   Idle ─────────────▶ Starting ─────────────▶ Running
//!    ▲                     │                       │ stop() / decode /
//!    │      open failed    │                       │ device closed
//!    ├─────────────────────┘                       ▼
//!    └──────────────────── loop released ◀──── Stopping
//! ```
//!
//! The device is opened and warmed up on the caller's thread. After that the
//! lease moves into a [`ScanLoop`] on a dedicated thread, and only that
//! thread touches the device until it releases it. `stop()` just raises the
//! cancel flag; the loop notices at its next iteration boundary.

use super::decoder::{DecodeCapability, QrDecoder};
use super::events::{EventReceiver, EventSender, ScanEvent, ScanStatus, event_channel};
use super::frame_loop::{ExitReason, LoopSettings, ScanLoop};
use crate::backends::camera::{CameraBackend, DeviceLease};
use crate::config::ScannerConfig;
use crate::errors::SessionError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const LOOP_THREAD_NAME: &str = "qr-scan-loop";

/// Builds a fresh decoder for each session
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn DecodeCapability> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Opening and warming up the device
    Starting,
    Running,
    /// Cancel requested, loop has not released the device yet
    Stopping,
}

/// Result of a successful [`ScanSession::start`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The loop is running
    Started,
    /// A session was already starting or running; nothing was opened
    AlreadyRunning,
    /// `stop()` arrived during warm-up; the device was released again
    Cancelled,
}

struct SessionInner {
    state: SessionState,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    /// Signalled whenever the state returns to Idle
    idle: Condvar,
    scanning: AtomicBool,
    events: EventSender,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_stop(&self) {
        let mut inner = self.lock();
        match inner.state {
            SessionState::Idle | SessionState::Stopping => {
                debug!(state = ?inner.state, "Stop requested, nothing to do");
            }
            SessionState::Starting => {
                info!("Stop requested during warm-up");
                inner.cancel.store(true, Ordering::SeqCst);
            }
            SessionState::Running => {
                info!("Stop requested");
                inner.cancel.store(true, Ordering::SeqCst);
                inner.state = SessionState::Stopping;
            }
        }
    }

    /// Return to Idle without a loop having run
    fn abort_start(&self, inner: &mut SessionInner) {
        inner.state = SessionState::Idle;
        self.idle.notify_all();
    }

    /// Called exactly once by the loop thread after the device is released
    fn finish(&self, reason: ExitReason) {
        let mut inner = self.lock();
        inner.state = SessionState::Idle;
        self.scanning.store(false, Ordering::SeqCst);
        // Published under the lock so a following start() cannot overtake them
        self.events
            .publish(ScanEvent::Status(ScanStatus::Stopped(reason)));
        self.events.publish(ScanEvent::ScanningChanged(false));
        self.idle.notify_all();
        debug!(reason = %reason, "Session returned to idle");
    }
}

/// Cloneable handle that can only request a stop
///
/// Useful for signal handlers and timers that must not own the session.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<SessionShared>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

pub struct ScanSession {
    backend: Arc<dyn CameraBackend>,
    decoder_factory: DecoderFactory,
    config: ScannerConfig,
    shared: Arc<SessionShared>,
}

impl ScanSession {
    /// Session decoding with [`QrDecoder`] configured from `config.hints`
    pub fn new(backend: Arc<dyn CameraBackend>, config: ScannerConfig) -> (Self, EventReceiver) {
        let hints = config.hints;
        Self::with_decoder(backend, config, move || Box::new(QrDecoder::new(hints)))
    }

    /// Session with a custom decode capability
    pub fn with_decoder<F>(
        backend: Arc<dyn CameraBackend>,
        config: ScannerConfig,
        decoder_factory: F,
    ) -> (Self, EventReceiver)
    where
        F: Fn() -> Box<dyn DecodeCapability> + Send + Sync + 'static,
    {
        let (events, receiver) = event_channel();
        let shared = Arc::new(SessionShared {
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                cancel: Arc::new(AtomicBool::new(false)),
                thread: None,
            }),
            idle: Condvar::new(),
            scanning: AtomicBool::new(false),
            events,
        });

        let session = Self {
            backend,
            decoder_factory: Box::new(decoder_factory),
            config,
            shared,
        };
        (session, receiver)
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// True from a successful open until the loop has released the device
    pub fn is_scanning(&self) -> bool {
        self.shared.scanning.load(Ordering::SeqCst)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open the device, warm it up and hand it to a new loop thread
    ///
    /// Blocks for the warm-up delay. If a previous session is still
    /// stopping, waits for it to release the device first.
    pub fn start(&self) -> Result<StartOutcome, SessionError> {
        let cancel = {
            let mut inner = self.shared.lock();
            loop {
                let state = inner.state;
                match state {
                    SessionState::Starting | SessionState::Running => {
                        debug!(state = ?state, "Start requested while active, ignoring");
                        return Ok(StartOutcome::AlreadyRunning);
                    }
                    SessionState::Stopping => {
                        debug!("Waiting for previous session to release the device");
                        inner = self
                            .shared
                            .idle
                            .wait(inner)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    SessionState::Idle => break,
                }
            }

            // The previous loop thread has already called finish()
            if let Some(handle) = inner.thread.take()
                && handle.join().is_err()
            {
                warn!("Previous scan thread panicked");
            }

            inner.state = SessionState::Starting;
            let cancel = Arc::new(AtomicBool::new(false));
            inner.cancel = Arc::clone(&cancel);
            cancel
        };

        self.shared
            .events
            .publish(ScanEvent::Status(ScanStatus::Opening));

        let spec = self.config.capture_spec();
        info!(backend = %self.backend.backend_type(), spec = %spec, "Opening capture device");

        let device = match self.backend.open(&spec) {
            Ok(device) => device,
            Err(e) => {
                error!(error = %e, "Failed to open capture device");
                let mut inner = self.shared.lock();
                self.shared.abort_start(&mut inner);
                self.shared
                    .events
                    .publish(ScanEvent::Status(ScanStatus::DeviceUnavailable(e.to_string())));
                return Err(SessionError::DeviceUnavailable(e));
            }
        };
        let lease = DeviceLease::new(device, spec.to_string());

        let warm_up = self.config.warm_up();
        if !warm_up.is_zero() {
            debug!(ms = warm_up.as_millis(), "Warming up capture device");
            thread::sleep(warm_up);
        }

        let mut inner = self.shared.lock();
        if cancel.load(Ordering::SeqCst) {
            info!("Start cancelled during warm-up");
            lease.release();
            self.shared.abort_start(&mut inner);
            self.shared
                .events
                .publish(ScanEvent::Status(ScanStatus::Stopped(ExitReason::Cancelled)));
            return Ok(StartOutcome::Cancelled);
        }

        let scan = ScanLoop::new(
            lease,
            (self.decoder_factory)(),
            self.shared.events.clone(),
            cancel,
            LoopSettings::from(&self.config),
        );

        inner.state = SessionState::Running;
        self.shared.scanning.store(true, Ordering::SeqCst);
        self.shared.events.publish(ScanEvent::ScanningChanged(true));
        self.shared
            .events
            .publish(ScanEvent::Status(ScanStatus::Scanning));

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || {
                let reason = match panic::catch_unwind(AssertUnwindSafe(|| scan.run())) {
                    Ok(report) => report.reason,
                    Err(_) => {
                        error!("Scan loop panicked");
                        ExitReason::Aborted
                    }
                };
                shared.finish(reason);
            });

        match spawned {
            Ok(handle) => {
                inner.thread = Some(handle);
                info!("Scan session started");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                // The closure, and the lease inside it, was dropped with the error
                error!(error = %e, "Failed to spawn scan thread");
                self.shared.scanning.store(false, Ordering::SeqCst);
                self.shared.abort_start(&mut inner);
                self.shared.events.publish(ScanEvent::ScanningChanged(false));
                Err(SessionError::SpawnFailed(e.to_string()))
            }
        }
    }

    /// Request cancellation without waiting for the loop
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Block until the session is idle and its loop thread has exited
    pub fn wait(&self) {
        let handle = {
            let mut inner = self.shared.lock();
            while inner.state != SessionState::Idle {
                inner = self
                    .shared
                    .idle
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            inner.thread.take()
        };

        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("Scan thread panicked");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        BackendError, BackendResult, CameraBackendType, CaptureDevice, CaptureSpec,
    };
    use std::sync::atomic::AtomicU32;

    struct Unplugged {
        opens: AtomicU32,
    }

    impl CameraBackend for Unplugged {
        fn open(&self, _spec: &CaptureSpec) -> BackendResult<Box<dyn CaptureDevice>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::DeviceNotFound("/dev/video9".into()))
        }

        fn backend_type(&self) -> CameraBackendType {
            CameraBackendType::Custom
        }
    }

    fn quick_config() -> ScannerConfig {
        let mut config = ScannerConfig::default();
        config.timing.warm_up_ms = 0;
        config
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let backend = Arc::new(Unplugged {
            opens: AtomicU32::new(0),
        });
        let (session, mut rx) = ScanSession::new(backend, quick_config());
        session.stop();
        session.stop_handle().stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_scanning());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_open_failure_returns_to_idle() {
        let backend = Arc::new(Unplugged {
            opens: AtomicU32::new(0),
        });
        let (session, mut rx) = ScanSession::new(backend.clone(), quick_config());

        let err = session.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::DeviceUnavailable(BackendError::DeviceNotFound(_))
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_scanning());
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);

        assert_eq!(
            rx.try_recv().ok(),
            Some(ScanEvent::Status(ScanStatus::Opening))
        );
        assert!(matches!(
            rx.try_recv().ok(),
            Some(ScanEvent::Status(ScanStatus::DeviceUnavailable(_)))
        ));
    }
}
