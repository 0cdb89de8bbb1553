// SPDX-License-Identifier: MPL-2.0

//! Camera Bridge - camera session control core
//!
//! Owns the capture session of a platform camera on behalf of a UI layer:
//! camera selection and size negotiation, capture request configuration,
//! the still-capture state machine, and dispatch of scan frames to vision
//! detectors.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Session thread, handlers, outbound events and frame dispatch
//! - [`backends`]: Platform camera abstraction and the virtual camera
//! - [`pipelines`]: Capture requests and the still-capture state machine
//! - [`config`]: User configuration handling
//! - [`storage`]: Picture persistence
//!
//! # Example
//!
//! ```no_run
//! use camera_bridge::backends::camera::types::Size;
//! use camera_bridge::backends::virtual_camera::VirtualCameraProvider;
//! use camera_bridge::{CameraSession, PictureOptions};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let (session, mut events) = CameraSession::builder(Box::new(VirtualCameraProvider::phone()))
//!     .runtime(runtime.handle().clone())
//!     .spawn()
//!     .unwrap();
//! session.set_preview_surface(Size::new(1080, 1920));
//! session.start();
//! session.take_picture(PictureOptions::default());
//! while let Some(event) = events.blocking_recv() {
//!     println!("{}", event.name());
//! }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use app::{CameraEvent, CameraSession, CameraSettings, EventReceiver, SessionBuilder};
pub use config::Config;
pub use errors::{AppError, AppResult, CameraError, PhotoError};
pub use pipelines::photo::{CaptureState, Flash, PictureOptions, WhiteBalance};
