// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

/// Aspect ratio used until the caller picks one
pub const DEFAULT_ASPECT_RATIO: (u32, u32) = (4, 3);

/// Preview sizes above this are not offered for the preview surface
pub const MAX_PREVIEW_WIDTH: u32 = 1920;

/// Preview sizes above this are not offered for the preview surface
pub const MAX_PREVIEW_HEIGHT: u32 = 1080;

/// Half the side of the tap-to-focus metering rectangle, in sensor pixels
pub const FOCUS_AREA_HALF_SIZE: i32 = 150;

/// Maximum 3A metering weight
pub const METERING_WEIGHT_MAX: i32 = 1000;

/// Digital zoom assumed when the camera does not report one
pub const DEFAULT_MAX_DIGITAL_ZOOM: f32 = 1.0;

/// Buffers kept by each image output
pub const IMAGE_OUTPUT_MAX_IMAGES: u32 = 1;

/// Smallest face the face detector reports, as a fraction of the frame width
pub const DEFAULT_MIN_FACE_SIZE: f32 = 0.15;

/// Name of the session owner thread
pub const SESSION_THREAD_NAME: &str = "camera-session";

/// Directory under the pictures folder where photos are written
pub const PHOTO_SUBDIRECTORY: &str = "camera";

/// Directory under the config folder holding `config.json`
pub const CONFIG_SUBDIRECTORY: &str = "camera-bridge";

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_cap_is_full_hd() {
        assert_eq!((MAX_PREVIEW_WIDTH, MAX_PREVIEW_HEIGHT), (1920, 1080));
        assert!(FOCUS_AREA_HALF_SIZE * 2 < MAX_PREVIEW_HEIGHT as i32);
    }
}
