// SPDX-License-Identifier: MPL-2.0

//! Frame processor module for async frame analysis
//!
//! Scan frames from the YUV output are routed to vision detectors through
//! the [`FrameDispatcher`]. QR code detection is built in; other detectors
//! plug in through the [`VisionDetector`] trait.

pub mod dispatcher;
pub mod tasks;
pub mod types;

pub use dispatcher::{DetectorKind, FrameDispatcher, ScanFrame, ScanningFlags, VisionDetector};
pub use tasks::qr_detector;
pub use types::{
    BarcodeDetection, Detection, FaceDetection, FaceDetectionMode, FaceDetectorSettings,
    FrameRegion, TextBlock,
};
