// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! Traits at the seam between the session core and the platform camera
//! stack. The shape follows the platform's object model:
//!
//! ```text
//! ┌─────────────────────┐
//! │   CameraSession     │  ← owner thread, state machine, settings
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraProvider    │  ← enumeration, characteristics, open, image outputs
//! └──────────┬──────────┘
//!            │ DeviceEvent::Opened
//!            ▼
//! ┌─────────────────────┐
//! │    CameraDevice     │  ← request templates, session creation
//! └──────────┬──────────┘
//!            │ DeviceEvent::SessionConfigured
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← repeating/one-shot requests
//! └─────────────────────┘
//! ```
//!
//! Everything asynchronous on the platform side (open, configure, capture
//! results, frames) comes back as a [`DeviceEvent`] through the
//! [`DeviceEventSink`] handed out by the session.

pub mod enumeration;
pub mod types;

pub use types::*;

use crate::pipelines::photo::request::{CaptureRequestConfig, OutputTarget, RequestTemplate};
use std::sync::Arc;

/// Entry point to a platform camera stack
pub trait CameraProvider: Send {
    /// Ids of all cameras, in platform order
    fn camera_ids(&self) -> BackendResult<Vec<String>>;

    /// Static metadata for a camera
    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics>;

    /// Start opening a camera
    ///
    /// Completion is reported later as `DeviceEvent::Opened` or
    /// `DeviceEvent::Error` through `events`. An `Err` here means the
    /// request itself was rejected.
    fn open_camera(&mut self, camera_id: &str, events: DeviceEventSink) -> BackendResult<()>;

    /// Create an image output frames can be delivered to
    fn create_image_output(
        &mut self,
        target: OutputTarget,
        size: Size,
        format: ImageFormat,
        max_images: u32,
    ) -> BackendResult<Box<dyn ImageOutput>>;
}

/// An opened camera device
pub trait CameraDevice: Send {
    fn id(&self) -> &str;

    /// A request pre-filled with the platform defaults for a template,
    /// including the default crop region
    fn create_capture_request(&self, template: RequestTemplate)
    -> BackendResult<CaptureRequestConfig>;

    /// Start configuring a capture session over the given outputs
    ///
    /// Completion is reported as `DeviceEvent::SessionConfigured` or
    /// `DeviceEvent::SessionConfigureFailed`.
    fn create_capture_session(
        &mut self,
        outputs: &[SessionOutput],
        events: DeviceEventSink,
    ) -> BackendResult<()>;

    fn close(&mut self);
}

/// A configured capture session
pub trait CaptureSession: Send {
    /// Replace the repeating request
    fn set_repeating_request(&mut self, request: &CaptureRequestConfig) -> BackendResult<()>;

    /// Submit a one-shot request
    fn capture(&mut self, request: &CaptureRequestConfig) -> BackendResult<()>;

    fn stop_repeating(&mut self) -> BackendResult<()>;

    fn close(&mut self);
}

/// A platform image reader backing the still or scan output
pub trait ImageOutput: Send {
    fn target(&self) -> OutputTarget;
    fn size(&self) -> Size;
    fn format(&self) -> ImageFormat;
    fn close(&mut self);
}

/// Output surface description used when configuring a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutput {
    pub target: OutputTarget,
    pub size: Size,
}

/// Asynchronous notifications from the platform
pub enum DeviceEvent {
    Opened(Box<dyn CameraDevice>),
    Closed,
    Disconnected,
    Error(String),
    SessionConfigured(Box<dyn CaptureSession>),
    SessionConfigureFailed(String),
    /// Partial metadata for an in-flight request
    CaptureProgressed(CaptureResult),
    /// Final metadata for a request
    CaptureCompleted(CaptureResult),
    CaptureFailed {
        tag: Option<RequestTag>,
        reason: String,
    },
    /// A frame is ready on an image output
    ImageAvailable(ImageFrame),
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::Opened(device) => write!(f, "Opened({})", device.id()),
            DeviceEvent::Closed => write!(f, "Closed"),
            DeviceEvent::Disconnected => write!(f, "Disconnected"),
            DeviceEvent::Error(msg) => write!(f, "Error({})", msg),
            DeviceEvent::SessionConfigured(_) => write!(f, "SessionConfigured"),
            DeviceEvent::SessionConfigureFailed(msg) => {
                write!(f, "SessionConfigureFailed({})", msg)
            }
            DeviceEvent::CaptureProgressed(result) => write!(f, "CaptureProgressed({:?})", result),
            DeviceEvent::CaptureCompleted(result) => write!(f, "CaptureCompleted({:?})", result),
            DeviceEvent::CaptureFailed { tag, reason } => {
                write!(f, "CaptureFailed({:?}, {})", tag, reason)
            }
            DeviceEvent::ImageAvailable(frame) => write!(
                f,
                "ImageAvailable({:?} {}x{}, {} bytes)",
                frame.format,
                frame.width,
                frame.height,
                frame.data.len()
            ),
        }
    }
}

/// Where platform callbacks post their events
///
/// Cheap to clone; backends keep a copy for as long as they may call back.
#[derive(Clone)]
pub struct DeviceEventSink {
    post: Arc<dyn Fn(DeviceEvent) + Send + Sync>,
}

impl DeviceEventSink {
    pub fn new<F>(post: F) -> Self
    where
        F: Fn(DeviceEvent) + Send + Sync + 'static,
    {
        Self {
            post: Arc::new(post),
        }
    }

    pub fn post(&self, event: DeviceEvent) {
        (self.post)(event)
    }
}

impl std::fmt::Debug for DeviceEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEventSink").finish_non_exhaustive()
    }
}
