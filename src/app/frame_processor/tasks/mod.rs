// SPDX-License-Identifier: GPL-3.0-only

//! Built-in detectors
//!
//! Face and text detectors are supplied by the embedding application
//! through [`VisionDetector`](super::dispatcher::VisionDetector).

pub mod qr_detector;

pub use qr_detector::QrDetector;
