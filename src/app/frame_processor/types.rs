// SPDX-License-Identifier: MPL-2.0

//! Core types for frame processing results
//!
//! These types represent the output of detectors and travel to the caller
//! inside detection events.

use crate::constants::DEFAULT_MIN_FACE_SIZE;
use serde::{Deserialize, Serialize};

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
/// This allows easy transformation to screen coordinates regardless of
/// the actual frame size or display scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        if frame_width == 0 || frame_height == 0 {
            return Self::default();
        }
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }

    /// Bounding box of a set of pixel corners, clamped to the frame
    pub fn bounding(corners: &[(i32, i32)], frame_width: u32, frame_height: u32) -> Self {
        let clamp_x = |v: i32| v.clamp(0, frame_width as i32) as u32;
        let clamp_y = |v: i32| v.clamp(0, frame_height as i32) as u32;

        let min_x = corners.iter().map(|c| clamp_x(c.0)).min().unwrap_or(0);
        let max_x = corners.iter().map(|c| clamp_x(c.0)).max().unwrap_or(0);
        let min_y = corners.iter().map(|c| clamp_y(c.1)).min().unwrap_or(0);
        let max_y = corners.iter().map(|c| clamp_y(c.1)).max().unwrap_or(0);

        Self::from_pixels(
            min_x,
            min_y,
            max_x - min_x,
            max_y - min_y,
            frame_width,
            frame_height,
        )
    }
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeDetection {
    /// Decoded payload
    pub data: String,
    /// Symbology, e.g. `"QR_CODE"`
    #[serde(rename = "type")]
    pub barcode_type: String,
    pub bounds: FrameRegion,
}

/// A detected face
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    pub bounds: FrameRegion,
    /// Head rotation around the axis pointing out of the image, in degrees
    pub roll_angle: Option<f32>,
    /// Head rotation around the vertical axis, in degrees
    pub yaw_angle: Option<f32>,
    pub smiling_probability: Option<f32>,
}

/// A block of recognized text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub value: String,
    pub bounds: FrameRegion,
}

/// One result produced by a detector
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Barcode(BarcodeDetection),
    Face(FaceDetection),
    Text(TextBlock),
}

/// Speed/accuracy tradeoff of the face detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceDetectionMode {
    #[default]
    Fast,
    Accurate,
}

/// Options handed to the registered face detector
///
/// Changing any of them makes the detector rebuild its model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceDetectorSettings {
    pub mode: FaceDetectionMode,
    /// Report eye, ear, nose and mouth positions
    pub landmarks: bool,
    /// Report smiling and eyes-open probabilities
    pub classifications: bool,
    /// Keep face ids stable across frames
    pub tracking: bool,
    pub min_face_size: f32,
}

impl Default for FaceDetectorSettings {
    fn default() -> Self {
        Self {
            mode: FaceDetectionMode::Fast,
            landmarks: false,
            classifications: false,
            tracking: false,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
        }
    }
}
