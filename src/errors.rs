// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Session controller errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The capture device could not be opened
    DeviceUnavailable(BackendError),
    /// The scan thread could not be spawned
    SpawnFailed(String),
}

/// Per-frame conversion errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Zero-size frame or a buffer too short for its dimensions
    EmptyFrame,
    /// Preview encoding failed
    EncodingFailed(String),
}

/// Decode adapter faults
///
/// A frame without a readable code is not an error; adapters return
/// `Ok(None)` for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Internal decoder failure
    Failed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DeviceUnavailable(e) => write!(f, "Camera unavailable: {}", e),
            SessionError::SpawnFailed(msg) => write!(f, "Failed to start scan thread: {}", msg),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::EmptyFrame => write!(f, "Frame is empty"),
            TransformError::EncodingFailed(msg) => write!(f, "Preview encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Failed(msg) => write!(f, "Decoder failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SessionError {}
impl std::error::Error for TransformError {}
impl std::error::Error for DecodeError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for TransformError {
    fn from(err: image::ImageError) -> Self {
        TransformError::EncodingFailed(err.to_string())
    }
}
