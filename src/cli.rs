// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing V4L2 capture devices
//! - Scanning a QR code from a camera or an image file

use crate::ScanArgs;
use qrscan::backends::camera::{CameraBackend, get_backend, v4l2};
use qrscan::backends::virtual_camera::StillImageBackend;
use qrscan::config::ScannerConfig;
use qrscan::pipelines::scan::{
    DecodeResult, PresentationSink, PreviewImage, QrContent, ScanSession, ScanStatus,
    StartOutcome, run_until_idle,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const PREVIEW_FILE_NAME: &str = "preview.jpg";

/// List all V4L2 capture devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = v4l2::enumerate_devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for device in &devices {
        println!("  {}  {}", device.path, device.card);
        println!("      Driver: {}  Bus: {}", device.driver, device.bus);
        println!();
    }

    Ok(())
}

/// Scan until a code is decoded, the user hits Ctrl-C or the timeout expires
pub fn scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ScannerConfig::load(path)?,
        None => ScannerConfig::load_default()?,
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let backend: Arc<dyn CameraBackend> = match &args.image {
        Some(path) => {
            println!("Scanning image: {}", path.display());
            Arc::new(StillImageBackend::from_path(path)?)
        }
        None => get_backend(),
    };

    let (session, mut events) = ScanSession::new(backend, config);

    let handle = session.stop_handle();
    ctrlc::set_handler(move || handle.stop())?;

    if let Some(secs) = args.timeout {
        let handle = session.stop_handle();
        thread::Builder::new()
            .name("qr-scan-timeout".to_string())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                info!(secs, "Scan timeout reached");
                handle.stop();
            })?;
    }

    match session.start()? {
        StartOutcome::Started => {}
        StartOutcome::AlreadyRunning => return Err("A scan is already running".into()),
        StartOutcome::Cancelled => return Err("Scan cancelled".into()),
    }
    println!("Scanning... (Ctrl-C to stop)");

    let mut sink = CliSink::new(args.preview_dir.clone())?;
    if !pollster::block_on(run_until_idle(&mut events, &mut sink)) {
        warn!("Event channel closed before the session finished");
    }
    session.wait();

    match sink.decoded {
        Some(result) => {
            print_result(&result);
            Ok(())
        }
        None => Err("No QR code decoded".into()),
    }
}

fn apply_overrides(config: &mut ScannerConfig, args: &ScanArgs) {
    if let Some(device) = &args.device {
        config.capture.device = Some(device.clone());
    }
    if let Some(width) = args.width {
        config.capture.width = width;
    }
    if let Some(height) = args.height {
        config.capture.height = height;
    }
    if let Some(fps) = args.fps {
        config.capture.fps = fps;
    }
}

fn print_result(result: &DecodeResult) {
    println!();
    println!("QR code found at frame {}:", result.frame_index);
    println!("{}", result.text);

    match result.content() {
        QrContent::Url(url) => println!("  Type: URL ({})", url),
        QrContent::Wifi {
            ssid,
            security,
            hidden,
            ..
        } => println!(
            "  Type: WiFi network \"{}\" ({:?}{})",
            ssid,
            security,
            if hidden { ", hidden" } else { "" }
        ),
        QrContent::Geo {
            latitude,
            longitude,
        } => println!("  Type: location {:.6}, {:.6}", latitude, longitude),
        other => println!("  Type: {}", other.kind()),
    }
}

/// Prints status to the terminal and keeps the newest preview on disk
struct CliSink {
    preview_dir: Option<PathBuf>,
    previews: u64,
    decoded: Option<DecodeResult>,
}

impl CliSink {
    fn new(preview_dir: Option<PathBuf>) -> std::io::Result<Self> {
        if let Some(dir) = &preview_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            preview_dir,
            previews: 0,
            decoded: None,
        })
    }

    /// Write through a temp file so readers never see a partial JPEG
    fn write_preview(&self, image: &PreviewImage) -> std::io::Result<()> {
        let Some(dir) = &self.preview_dir else {
            return Ok(());
        };
        let target = dir.join(PREVIEW_FILE_NAME);
        let tmp = target.with_extension("jpg.tmp");
        std::fs::write(&tmp, &image.jpeg)?;
        std::fs::rename(&tmp, &target)
    }
}

impl PresentationSink for CliSink {
    fn on_preview(&mut self, frame_index: u64, image: PreviewImage) {
        self.previews += 1;
        debug!(frame = frame_index, ?image, "Preview received");
        if let Err(e) = self.write_preview(&image) {
            warn!(error = %e, "Failed to write preview");
        }
    }

    fn on_decoded(&mut self, result: DecodeResult) {
        info!(
            frame = result.frame_index,
            kind = result.content().kind(),
            at = %result.decoded_at.format("%H:%M:%S%.3f"),
            "Decoded"
        );
        self.decoded = Some(result);
    }

    fn on_status(&mut self, status: ScanStatus) {
        match status {
            ScanStatus::Stopped(reason) => {
                info!(reason = %reason, previews = self.previews, "Scan stopped")
            }
            other => debug!(status = %other, "Status"),
        }
    }
}
