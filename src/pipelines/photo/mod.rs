// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! # Stages
//!
//! 1. **Request configuration**: caller settings become request fields
//! 2. **State machine**: AF lock and AE precapture are sequenced from
//!    per-frame capture results
//! 3. **Still request**: the final one-shot JPEG request is derived from
//!    the live preview request

pub mod capture;
pub mod request;
pub mod state_machine;

pub use capture::{PictureOptions, build_still_request, detection_rotation, output_rotation};
pub use request::{CaptureRequestConfig, Flash, OutputTarget, RequestTemplate, WhiteBalance};
pub use state_machine::{CaptureAction, CaptureState, CaptureStateMachine};
