// SPDX-License-Identifier: GPL-3.0-only

//! Capture request configuration
//!
//! A [`CaptureRequestConfig`] is the in-memory description of what the
//! sensor and ISP should do for a request: 3A modes, flash, crop region,
//! JPEG settings. The session keeps one for the repeating preview and
//! rebuilds one-shot copies of it for triggers and still captures.
//!
//! The `apply_*` functions translate caller-facing settings into request
//! fields. They are pure data transformations; pushing the request to the
//! device is the session's job.

use crate::backends::camera::types::{
    AeMode, AePrecaptureTrigger, AfMode, AfTrigger, AwbMode, ControlMode, FlashMode,
    MeteringRectangle, Rect, RequestTag,
};
use crate::constants::{FOCUS_AREA_HALF_SIZE, METERING_WEIGHT_MAX};
use serde::{Deserialize, Serialize};

/// Request template the platform fills defaults from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
}

/// Output surfaces a request can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Preview surface owned by the UI layer
    Preview,
    /// JPEG image output for still pictures
    StillImage,
    /// YUV image output feeding the detectors
    ScanImage,
}

/// Caller-facing flash setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flash {
    #[default]
    Off,
    On,
    Torch,
    Auto,
    RedEye,
}

impl Flash {
    /// Decode the integer constant used across the bridge
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Flash::Off),
            1 => Some(Flash::On),
            2 => Some(Flash::Torch),
            3 => Some(Flash::Auto),
            4 => Some(Flash::RedEye),
            _ => None,
        }
    }

    /// AE and flash unit modes for this setting
    pub fn modes(self) -> (AeMode, FlashMode) {
        match self {
            Flash::Off => (AeMode::On, FlashMode::Off),
            Flash::On => (AeMode::OnAlwaysFlash, FlashMode::Off),
            Flash::Torch => (AeMode::On, FlashMode::Torch),
            Flash::Auto => (AeMode::OnAutoFlash, FlashMode::Off),
            Flash::RedEye => (AeMode::OnAutoFlashRedEye, FlashMode::Off),
        }
    }
}

/// Caller-facing white balance setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhiteBalance {
    #[default]
    Auto,
    Cloudy,
    Sunny,
    Shadow,
    Fluorescent,
    Incandescent,
}

impl WhiteBalance {
    /// Decode the integer constant used across the bridge
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(WhiteBalance::Auto),
            1 => Some(WhiteBalance::Cloudy),
            2 => Some(WhiteBalance::Sunny),
            3 => Some(WhiteBalance::Shadow),
            4 => Some(WhiteBalance::Fluorescent),
            5 => Some(WhiteBalance::Incandescent),
            _ => None,
        }
    }

    pub fn awb_mode(self) -> AwbMode {
        match self {
            WhiteBalance::Auto => AwbMode::Auto,
            WhiteBalance::Cloudy => AwbMode::CloudyDaylight,
            WhiteBalance::Sunny => AwbMode::Daylight,
            WhiteBalance::Shadow => AwbMode::Shade,
            WhiteBalance::Fluorescent => AwbMode::Fluorescent,
            WhiteBalance::Incandescent => AwbMode::Incandescent,
        }
    }
}

/// Mutable description of a capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequestConfig {
    pub template: RequestTemplate,
    pub targets: Vec<OutputTarget>,
    pub control_mode: ControlMode,
    pub af_mode: AfMode,
    pub af_trigger: Option<AfTrigger>,
    pub af_regions: Vec<MeteringRectangle>,
    pub ae_mode: AeMode,
    pub ae_precapture_trigger: Option<AePrecaptureTrigger>,
    pub flash_mode: FlashMode,
    pub awb_mode: AwbMode,
    /// Digital zoom window; `None` means the platform default
    pub crop_region: Option<Rect>,
    /// Zoom factor in [0, 1] the crop region was derived from
    pub zoom_factor: f32,
    /// Manual focus distance in diopters
    pub lens_focus_distance: Option<f32>,
    pub jpeg_quality: Option<u8>,
    pub jpeg_orientation: Option<i32>,
    pub tag: Option<RequestTag>,
}

impl CaptureRequestConfig {
    /// Empty request for a template
    ///
    /// Platforms normally hand out pre-filled requests; this is the
    /// starting point they fill.
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            control_mode: ControlMode::Auto,
            af_mode: AfMode::Off,
            af_trigger: None,
            af_regions: Vec::new(),
            ae_mode: AeMode::On,
            ae_precapture_trigger: None,
            flash_mode: FlashMode::Off,
            awb_mode: AwbMode::Auto,
            crop_region: None,
            zoom_factor: 0.0,
            lens_focus_distance: None,
            jpeg_quality: None,
            jpeg_orientation: None,
            tag: None,
        }
    }

    pub fn add_target(&mut self, target: OutputTarget) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn remove_target(&mut self, target: OutputTarget) {
        self.targets.retain(|t| *t != target);
    }

    /// Copy of this request carrying a tag, used for one-shot submissions
    pub fn tagged(&self, tag: RequestTag) -> Self {
        let mut request = self.clone();
        request.tag = Some(tag);
        request
    }

    /// Set AE and flash modes from the flash lookup table
    pub fn apply_flash(&mut self, flash: Flash) {
        let (ae_mode, flash_mode) = flash.modes();
        self.ae_mode = ae_mode;
        self.flash_mode = flash_mode;
    }

    /// Select the AF mode
    ///
    /// Returns the effective autofocus flag: lenses that only support
    /// `AfMode::Off` cannot autofocus, whatever the caller asked for.
    pub fn apply_autofocus(&mut self, autofocus: bool, available: &[AfMode]) -> bool {
        if !autofocus {
            self.af_mode = AfMode::Off;
            return false;
        }
        let fixed_focus = available.iter().all(|mode| *mode == AfMode::Off);
        if fixed_focus {
            self.af_mode = AfMode::Off;
            false
        } else {
            self.af_mode = AfMode::ContinuousPicture;
            true
        }
    }

    /// Set the manual focus distance as a fraction of the closest focus distance
    ///
    /// No-op while autofocus is on.
    pub fn apply_focus_depth(
        &mut self,
        depth: f32,
        autofocus: bool,
        minimum_focus_distance: Option<f32>,
    ) -> Result<(), String> {
        if autofocus {
            return Ok(());
        }
        let minimum = minimum_focus_distance
            .ok_or_else(|| "minimum focus distance is not reported".to_string())?;
        self.lens_focus_distance = Some(depth * minimum);
        Ok(())
    }

    pub fn apply_white_balance(&mut self, white_balance: WhiteBalance) {
        self.awb_mode = white_balance.awb_mode();
    }

    /// Set the crop region for a zoom factor in [0, 1]
    ///
    /// Without an active array size the request is left untouched.
    pub fn apply_zoom(
        &mut self,
        zoom: f32,
        active_array: Option<Rect>,
        max_digital_zoom: f32,
        initial_crop_region: Option<Rect>,
    ) {
        let Some(active_array) = active_array else {
            return;
        };
        self.zoom_factor = zoom;
        self.crop_region =
            Some(zoom_crop_region(zoom, active_array, max_digital_zoom, initial_crop_region));
    }
}

/// Crop region for a zoom factor in [0, 1]
///
/// The scaled zoom `zoom * (max - 1) + 1` shrinks a window centered in the
/// active array. At exactly 1.0 the cached initial crop region is returned
/// as-is: some devices report an initial region that differs slightly from
/// the computed one and freeze when handed the computed one.
pub fn zoom_crop_region(
    zoom: f32,
    active_array: Rect,
    max_digital_zoom: f32,
    initial_crop_region: Option<Rect>,
) -> Rect {
    let scaled = zoom * (max_digital_zoom - 1.0) + 1.0;
    if scaled == 1.0 {
        if let Some(initial) = initial_crop_region {
            return initial;
        }
    }

    let width = active_array.width();
    let height = active_array.height();
    let zoomed_width = (width as f32 / scaled) as i32;
    let zoomed_height = (height as f32 / scaled) as i32;
    let width_offset = (width - zoomed_width) / 2;
    let height_offset = (height - zoomed_height) / 2;

    Rect::new(
        active_array.left + width_offset,
        active_array.top + height_offset,
        active_array.right - width_offset,
        active_array.bottom - height_offset,
    )
}

/// Metering rectangle for a tap at normalized `(x, y)`
///
/// The sensor is mounted rotated relative to the preview, so the
/// normalized coordinates swap axes.
pub fn focus_area(x: f32, y: f32, active_array: Rect) -> MeteringRectangle {
    let sensor_x = (y * active_array.height() as f32) as i32;
    let sensor_y = (x * active_array.width() as f32) as i32;

    MeteringRectangle {
        x: (sensor_y - FOCUS_AREA_HALF_SIZE).max(0),
        y: (sensor_x - FOCUS_AREA_HALF_SIZE).max(0),
        width: FOCUS_AREA_HALF_SIZE * 2,
        height: FOCUS_AREA_HALF_SIZE * 2,
        weight: METERING_WEIGHT_MAX - 1,
    }
}
