// SPDX-License-Identifier: MPL-2.0

//! Still picture request construction
//!
//! Builds the one-shot request issued when the capture state machine
//! reaches `Capturing`, and the rotation math shared with frame dispatch.

use super::request::{CaptureRequestConfig, Flash, OutputTarget};
use crate::backends::camera::types::{Facing, RequestTag};
use serde::Deserialize;

/// Options passed with a take-picture command
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PictureOptions {
    /// JPEG quality in [0.0, 1.0]; platform default when absent
    pub quality: Option<f64>,
    /// Keep the preview stopped after the capture completes
    pub pause_after_capture: bool,
    /// Flip the saved image horizontally
    pub mirror_image: bool,
    /// Skip writing the file, only describe the picture
    pub do_not_save: bool,
    /// Include an EXIF map in the saved picture descriptor
    pub exif: bool,
}

impl PictureOptions {
    /// JPEG quality scaled to 0..=100
    pub fn jpeg_quality(&self) -> Option<u8> {
        self.quality
            .map(|q| (q * 100.0).clamp(0.0, 100.0) as u8)
    }
}

fn is_landscape(orientation: i32) -> bool {
    matches!(orientation.rem_euclid(360), 90 | 270)
}

/// JPEG orientation for a still capture
///
/// Front cameras need an extra 180° when the device is held in landscape.
pub fn output_rotation(facing: Facing, sensor_orientation: i32, device_orientation: i32) -> i32 {
    match facing {
        Facing::Back => (sensor_orientation + device_orientation).rem_euclid(360),
        Facing::Front => {
            let landscape_flip = if is_landscape(device_orientation) {
                180
            } else {
                0
            };
            (sensor_orientation + device_orientation + landscape_flip).rem_euclid(360)
        }
    }
}

/// Rotation handed to detectors along with a scan frame
pub fn detection_rotation(device_rotation: i32, facing: Facing, camera_orientation: i32) -> i32 {
    match facing {
        Facing::Front => (camera_orientation + device_rotation).rem_euclid(360),
        Facing::Back => {
            let landscape_flip = if is_landscape(device_rotation) { 180 } else { 0 };
            (camera_orientation - device_rotation + landscape_flip).rem_euclid(360)
        }
    }
}

/// Build the still capture request
///
/// `template` is the platform's still-capture template. Focus mode and
/// crop region come from the live preview request so the picture matches
/// what the preview shows.
pub fn build_still_request(
    template: CaptureRequestConfig,
    preview: &CaptureRequestConfig,
    flash: Flash,
    jpeg_orientation: i32,
    options: &PictureOptions,
) -> CaptureRequestConfig {
    let mut request = template;
    request.targets.clear();
    request.add_target(OutputTarget::StillImage);
    request.af_mode = preview.af_mode;
    request.apply_flash(flash);
    request.jpeg_orientation = Some(jpeg_orientation);
    if let Some(quality) = options.jpeg_quality() {
        request.jpeg_quality = Some(quality);
    }
    request.crop_region = preview.crop_region;
    request.zoom_factor = preview.zoom_factor;
    request.tag = Some(RequestTag::StillCapture);
    request
}
