// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends
//!
//! These mirror the vocabulary of a Camera2-style platform stack: sensor
//! characteristics, 3A modes and states, and the frames delivered by image
//! outputs.

use crate::constants::DEFAULT_ASPECT_RATIO;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Which camera the caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Back,
    Front,
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Back => write!(f, "back"),
            Facing::Front => write!(f, "front"),
        }
    }
}

/// Lens facing as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Back,
    Front,
    External,
}

impl LensFacing {
    /// Facing exposed to the caller. External cameras are treated as back cameras.
    pub fn as_facing(self) -> Facing {
        match self {
            LensFacing::Front => Facing::Front,
            LensFacing::Back | LensFacing::External => Facing::Back,
        }
    }
}

/// Supported hardware level of a camera device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareLevel {
    Legacy,
    Limited,
    Full,
    Level3,
    External,
}

/// Output resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Ord for Size {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.area()
            .cmp(&other.area())
            .then(self.width.cmp(&other.width))
    }
}

impl PartialOrd for Size {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Aspect ratio reduced to lowest terms (e.g. 4:3, 16:9)
///
/// Ordered by the numeric value of `x / y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    x: u32,
    y: u32,
}

impl AspectRatio {
    /// Create a ratio, reducing it by the greatest common divisor
    ///
    /// Returns `None` when either side is zero.
    pub fn new(x: u32, y: u32) -> Option<Self> {
        if x == 0 || y == 0 {
            return None;
        }
        let divisor = gcd(x, y);
        Some(Self {
            x: x / divisor,
            y: y / divisor,
        })
    }

    /// Ratio of a size
    pub fn of(size: Size) -> Option<Self> {
        Self::new(size.width, size.height)
    }

    /// Parse `"4:3"`
    pub fn parse(s: &str) -> Option<Self> {
        let (x, y) = s.trim().split_once(':')?;
        Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?)
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// Check whether a size has exactly this ratio
    pub fn matches(&self, size: Size) -> bool {
        Self::of(size) == Some(*self)
    }

    pub fn as_f32(&self) -> f32 {
        self.x as f32 / self.y as f32
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        let (x, y) = DEFAULT_ASPECT_RATIO;
        Self { x, y }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Ord for AspectRatio {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.x as u64 * other.y as u64).cmp(&(other.x as u64 * self.y as u64))
    }
}

impl PartialOrd for AspectRatio {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid aspect ratio: {value}"))
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.to_string()
    }
}

/// Sizes grouped by aspect ratio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeMap {
    ratios: BTreeMap<AspectRatio, BTreeSet<Size>>,
}

impl SizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a size. Returns false for degenerate or duplicate sizes.
    pub fn add(&mut self, size: Size) -> bool {
        let Some(ratio) = AspectRatio::of(size) else {
            return false;
        };
        self.ratios.entry(ratio).or_default().insert(size)
    }

    pub fn remove(&mut self, ratio: &AspectRatio) {
        self.ratios.remove(ratio);
    }

    pub fn ratios(&self) -> impl Iterator<Item = AspectRatio> + '_ {
        self.ratios.keys().copied()
    }

    pub fn contains(&self, ratio: &AspectRatio) -> bool {
        self.ratios.contains_key(ratio)
    }

    /// Sizes for a ratio, smallest first
    pub fn sizes(&self, ratio: &AspectRatio) -> Vec<Size> {
        self.ratios
            .get(ratio)
            .map(|sizes| sizes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Largest size for a ratio
    pub fn largest(&self, ratio: &AspectRatio) -> Option<Size> {
        self.ratios.get(ratio).and_then(|sizes| sizes.last().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn clear(&mut self) {
        self.ratios.clear();
    }
}

/// Rectangle in sensor active-array coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Weighted region used for 3A metering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringRectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: i32,
}

/// Autofocus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AfMode {
    #[default]
    Off,
    Auto,
    Macro,
    ContinuousVideo,
    ContinuousPicture,
    Edof,
}

/// Autofocus trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfTrigger {
    Idle,
    Start,
    Cancel,
}

/// Auto-exposure mode (also selects flash behaviour)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AeMode {
    Off,
    #[default]
    On,
    OnAutoFlash,
    OnAlwaysFlash,
    OnAutoFlashRedEye,
}

/// Auto-exposure precapture trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AePrecaptureTrigger {
    Idle,
    Start,
    Cancel,
}

/// Flash unit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashMode {
    #[default]
    Off,
    Single,
    Torch,
}

/// Auto white balance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AwbMode {
    Off,
    #[default]
    Auto,
    Incandescent,
    Fluorescent,
    WarmFluorescent,
    Daylight,
    CloudyDaylight,
    Twilight,
    Shade,
}

/// Overall 3A control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    Off,
    #[default]
    Auto,
}

/// Autofocus state reported in capture results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    Inactive,
    PassiveScan,
    PassiveFocused,
    ActiveScan,
    FocusedLocked,
    NotFocusedLocked,
    PassiveUnfocused,
}

impl AfState {
    /// Focus is locked, whether or not it found focus
    pub fn is_locked(self) -> bool {
        matches!(self, AfState::FocusedLocked | AfState::NotFocusedLocked)
    }
}

/// Auto exposure state reported in capture results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeState {
    Inactive,
    Searching,
    Converged,
    Locked,
    FlashRequired,
    Precapture,
}

impl AeState {
    /// Parse the names used by scripted sequences (`converged`, `flash-required`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "inactive" => Some(AeState::Inactive),
            "searching" => Some(AeState::Searching),
            "converged" => Some(AeState::Converged),
            "locked" => Some(AeState::Locked),
            "flash-required" => Some(AeState::FlashRequired),
            "precapture" => Some(AeState::Precapture),
            _ => None,
        }
    }
}

/// Tag attached to submitted requests so results can be routed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestTag {
    /// Repeating preview request
    Preview,
    /// One-shot request carrying the AF start trigger
    LockFocus,
    /// One-shot request carrying the AE precapture trigger
    Precapture,
    /// Still picture request
    StillCapture,
    /// One-shot request cancelling the AF trigger
    UnlockFocus,
    /// Tap-to-focus request
    FocusArea,
}

/// Per-frame 3A metadata delivered for a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CaptureResult {
    /// Tag of the request this result belongs to
    pub tag: Option<RequestTag>,
    /// Partial results arrive before the total result of the same frame
    pub partial: bool,
    pub af_state: Option<AfState>,
    pub ae_state: Option<AeState>,
}

impl CaptureResult {
    pub fn preview(af_state: Option<AfState>, ae_state: Option<AeState>) -> Self {
        Self {
            tag: Some(RequestTag::Preview),
            partial: false,
            af_state,
            ae_state,
        }
    }
}

/// Image format of an image output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Compressed still pictures
    Jpeg,
    /// Scan frames; only the luma plane is forwarded
    Yuv420,
}

/// A frame acquired from an image output
///
/// `data` holds the first plane only: the JPEG stream, or the Y plane
/// for YUV frames.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

/// Static camera metadata
///
/// Every field is optional because platforms may omit any of them;
/// the session decides which ones are required.
#[derive(Debug, Clone, Default)]
pub struct CameraCharacteristics {
    pub lens_facing: Option<LensFacing>,
    pub hardware_level: Option<HardwareLevel>,
    /// Clockwise rotation of the sensor relative to the device's natural orientation
    pub sensor_orientation: Option<i32>,
    pub active_array_size: Option<Rect>,
    pub max_digital_zoom: Option<f32>,
    /// Closest focus distance in diopters
    pub minimum_focus_distance: Option<f32>,
    pub af_available_modes: Vec<AfMode>,
    pub max_af_regions: i32,
    /// A flash unit is fitted
    pub flash_available: Option<bool>,
    /// Sizes the preview surface can be configured with
    pub preview_sizes: Vec<Size>,
    /// JPEG output sizes
    pub picture_sizes: Vec<Size>,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised at the platform seam
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Camera id unknown to the platform
    DeviceNotFound(String),
    /// Camera in use or permission denied
    AccessDenied(String),
    /// Device went away
    Disconnected,
    /// Session or device already closed
    Closed,
    /// Request rejected by the platform
    RequestFailed(String),
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(id) => write!(f, "Device not found: {}", id),
            BackendError::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            BackendError::Disconnected => write!(f, "Device disconnected"),
            BackendError::Closed => write!(f, "Device or session closed"),
            BackendError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
