// SPDX-License-Identifier: GPL-3.0-only

//! Persistent session configuration
//!
//! Stored as JSON under the user config directory. Every field has a
//! default, so partial or older files load fine.

use crate::app::frame_processor::{FaceDetectorSettings, ScanningFlags};
use crate::backends::camera::types::{AspectRatio, Facing, Size};
use crate::constants::CONFIG_SUBDIRECTORY;
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::{Flash, WhiteBalance};
use crate::storage::default_photo_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the configuration file inside the config directory
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Camera facing to open when no camera id is pinned
    pub facing: Facing,
    /// Pin a specific camera id; overrides `facing`
    pub camera_id: Option<String>,
    /// Preferred aspect ratio, e.g. "4:3"
    pub aspect_ratio: AspectRatio,
    pub flash: Flash,
    pub auto_focus: bool,
    /// Manual focus position in [0, 1], used when autofocus is off
    pub focus_depth: f32,
    /// Digital zoom in [0, 1]
    pub zoom: f32,
    pub white_balance: WhiteBalance,
    /// Explicit still picture size; largest for the aspect ratio when unset
    pub picture_size: Option<Size>,
    /// Detectors enabled on scan frames
    pub scanning: ScanningFlags,
    /// Options passed to the face detector
    pub face_detection: FaceDetectorSettings,
    /// Where pictures are written; `<pictures>/camera` when unset
    pub photo_directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            facing: Facing::Back,
            camera_id: None,
            aspect_ratio: AspectRatio::default(),
            flash: Flash::Off,
            auto_focus: true,
            focus_depth: 0.0,
            zoom: 0.0,
            white_balance: WhiteBalance::Auto,
            picture_size: None,
            scanning: ScanningFlags::default(),
            face_detection: FaceDetectorSettings::default(),
            photo_directory: None,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_SUBDIRECTORY).join(CONFIG_FILE_NAME))
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config.sanitized())
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            warn!(error = %e, path = %path.display(), "Failed to load config, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Clamp normalized values into [0, 1]
    pub fn sanitized(mut self) -> Self {
        let zoom = clamp_unit(self.zoom);
        if zoom != self.zoom {
            warn!(zoom = self.zoom, "Zoom out of range, clamped");
            self.zoom = zoom;
        }
        let focus_depth = clamp_unit(self.focus_depth);
        if focus_depth != self.focus_depth {
            warn!(focus_depth = self.focus_depth, "Focus depth out of range, clamped");
            self.focus_depth = focus_depth;
        }
        self
    }

    /// Effective picture directory
    pub fn photo_directory(&self) -> PathBuf {
        self.photo_directory.clone().unwrap_or_else(default_photo_dir)
    }

    /// Parse a configuration file body without touching the filesystem
    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str::<Config>(json)
            .map(Config::sanitized)
            .map_err(|e| AppError::Config(e.to_string()))
    }
}

/// Clamp into [0, 1]; NaN becomes 0
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
