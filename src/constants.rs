// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Default capture request
pub mod capture {
    /// Requested frame width; the device may approximate it
    pub const WIDTH: u32 = 640;
    /// Requested frame height
    pub const HEIGHT: u32 = 480;
    /// Requested frame rate
    pub const FPS: u32 = 30;
}

/// Scan loop pacing
pub mod timing {
    use super::Duration;

    /// Pause after opening the device before the first read
    pub const WARM_UP: Duration = Duration::from_millis(300);
    /// Sleep at the end of every iteration, caps decode attempts at ~30/s
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(30);
    /// Back-off after a failed read, an empty frame or a per-frame fault
    pub const RETRY_DELAY: Duration = Duration::from_millis(10);
}

/// A preview is rendered on every Nth valid frame
pub const PREVIEW_INTERVAL: u64 = 6;

/// JPEG quality used for preview images (0-100)
pub const PREVIEW_JPEG_QUALITY: u8 = 70;

/// Resolution of the sample handed to the decoder
pub const DECODE_SAMPLE_WIDTH: u32 = 320;
pub const DECODE_SAMPLE_HEIGHT: u32 = 240;

/// Config file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Application directory name under the XDG config dir
pub const APP_DIR_NAME: &str = "qrscan";
