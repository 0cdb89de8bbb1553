// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera session core

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera lifecycle errors
///
/// Everything in here ends up as a single mount error for the caller,
/// except `ConfigurationFailed` which setters recover from by rolling back.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// The selected camera only supports the legacy hardware level
    LegacyHardware(String),
    /// A required characteristic is missing from the camera metadata
    CharacteristicsMissing(&'static str),
    /// Opening or talking to the device failed (busy, permission denied, ...)
    AccessFailed(String),
    /// Camera disconnected during operation
    Disconnected,
    /// Operation needs an open camera and capture session
    NotOpen,
    /// Applying a capture request or configuring the session failed
    ConfigurationFailed(String),
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoError {
    /// Camera is not running
    NotReady,
    /// A still capture is already in flight
    CaptureInProgress,
    /// Capture request failed
    CaptureFailed(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Save failed
    SaveFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera available"),
            CameraError::LegacyHardware(id) => {
                write!(f, "Camera {} only supports legacy hardware level", id)
            }
            CameraError::CharacteristicsMissing(what) => {
                write!(f, "Camera characteristic missing: {}", what)
            }
            CameraError::AccessFailed(msg) => write!(f, "Failed to access camera: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::NotOpen => write!(f, "Camera is not running"),
            CameraError::ConfigurationFailed(msg) => write!(f, "Configuration failed: {}", msg),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NotReady => write!(f, "Camera is not running"),
            PhotoError::CaptureInProgress => write!(f, "A capture is already in progress"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PhotoError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Disconnected => CameraError::Disconnected,
            BackendError::DeviceNotFound(_) => CameraError::NoCameraFound,
            other => CameraError::AccessFailed(other.to_string()),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

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

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        PhotoError::EncodingFailed(err.to_string())
    }
}
