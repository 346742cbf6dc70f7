// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Settings are read from `$XDG_CONFIG_HOME/qrscan/config.json`. Every field
//! is optional in the file; anything missing falls back to the defaults in
//! [`crate::constants`].

use crate::backends::camera::{CaptureSpec, Framerate};
use crate::constants::{self, timing};
use crate::errors::{AppError, AppResult};
use crate::pipelines::scan::DecodeHints;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Capture device request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Device path; `None` uses the first V4L2 capture device
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: None,
            width: constants::capture::WIDTH,
            height: constants::capture::HEIGHT,
            fps: constants::capture::FPS,
        }
    }
}

/// Loop pacing, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub warm_up_ms: u64,
    pub frame_interval_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            warm_up_ms: timing::WARM_UP.as_millis() as u64,
            frame_interval_ms: timing::FRAME_INTERVAL.as_millis() as u64,
            retry_delay_ms: timing::RETRY_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub capture: CaptureSettings,
    pub timing: TimingSettings,
    /// Render a preview on every Nth valid frame
    pub preview_interval: u64,
    /// JPEG quality for previews (1-100)
    pub preview_quality: u8,
    /// Size of the sample handed to the decoder
    pub sample_width: u32,
    pub sample_height: u32,
    pub hints: DecodeHints,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            timing: TimingSettings::default(),
            preview_interval: constants::PREVIEW_INTERVAL,
            preview_quality: constants::PREVIEW_JPEG_QUALITY,
            sample_width: constants::DECODE_SAMPLE_WIDTH,
            sample_height: constants::DECODE_SAMPLE_HEIGHT,
            hints: DecodeHints::default(),
        }
    }
}

impl ScannerConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::APP_DIR_NAME)
                .join(constants::CONFIG_FILE_NAME)
        })
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load_default() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the scan loop cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(AppError::Config(
                "capture width and height must be non-zero".to_string(),
            ));
        }
        if self.capture.fps == 0 {
            return Err(AppError::Config("capture fps must be non-zero".to_string()));
        }
        if self.preview_interval == 0 {
            return Err(AppError::Config(
                "preview_interval must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.preview_quality) {
            return Err(AppError::Config(format!(
                "preview_quality must be 1-100, got {}",
                self.preview_quality
            )));
        }
        if self.sample_width == 0 || self.sample_height == 0 {
            return Err(AppError::Config(
                "sample_width and sample_height must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Capability request for the capture backend
    pub fn capture_spec(&self) -> CaptureSpec {
        CaptureSpec {
            device: self.capture.device.clone(),
            width: self.capture.width,
            height: self.capture.height,
            framerate: Framerate::from_int(self.capture.fps),
        }
    }

    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.timing.warm_up_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.timing.frame_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.timing.retry_delay_ms)
    }
}
