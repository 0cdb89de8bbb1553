// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture handlers
//!
//! Drives the capture state machine from capture results and executes the
//! actions it returns: AF lock, AE precapture and the final still request.
//! Also routes still and scan images once they arrive.

use crate::app::events::CameraEvent;
use crate::app::frame_processor::ScanFrame;
use crate::app::state::SessionCore;
use crate::backends::camera::types::{
    AePrecaptureTrigger, AfMode, AfTrigger, CaptureResult, ImageFrame, RequestTag,
};
use crate::errors::{CameraError, PhotoError};
use crate::pipelines::photo::state_machine::CaptureBusy;
use crate::pipelines::photo::{
    CaptureAction, CaptureRequestConfig, PictureOptions, RequestTemplate, build_still_request,
    detection_rotation, output_rotation,
};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// The JPEG orientation is set on the still request, so the bytes never
/// need rotating afterwards
const SOFTWARE_ROTATION: i32 = 0;

impl SessionCore {
    // =========================================================================
    // Take Picture
    // =========================================================================

    pub(crate) fn take_picture(&mut self, options: PictureOptions) {
        if !self.is_session_live() {
            warn!("Picture requested without a running preview");
            self.emit(CameraEvent::PictureFailed {
                message: PhotoError::NotReady.to_string(),
            });
            return;
        }

        match self.fsm.take_picture(self.settings.auto_focus) {
            Ok(action) => {
                info!(auto_focus = self.settings.auto_focus, "Taking picture");
                self.pending_pictures.push_back(options);
                self.perform(action);
            }
            Err(CaptureBusy(state)) => {
                warn!(?state, "Capture already in progress");
                self.emit(CameraEvent::PictureFailed {
                    message: PhotoError::CaptureInProgress.to_string(),
                });
            }
        }
    }

    fn perform(&mut self, action: CaptureAction) {
        match action {
            CaptureAction::None => {}
            CaptureAction::TriggerAutofocus => self.lock_focus(),
            CaptureAction::TriggerPrecapture => self.run_precapture(),
            CaptureAction::CaptureStill => self.capture_still(),
        }
    }

    /// Submit a one-shot copy of the preview request
    fn submit_trigger(
        &mut self,
        tag: RequestTag,
        set_trigger: impl FnOnce(&mut CaptureRequestConfig),
    ) -> Result<(), CameraError> {
        let (session, request) = self
            .handle
            .as_mut()
            .and_then(|handle| handle.live())
            .ok_or(CameraError::NotOpen)?;
        let mut trigger = request.tagged(tag);
        set_trigger(&mut trigger);
        session.capture(&trigger)?;
        Ok(())
    }

    fn lock_focus(&mut self) {
        debug!("Locking focus");
        if let Err(e) = self.submit_trigger(RequestTag::LockFocus, |request| {
            request.af_trigger = Some(AfTrigger::Start);
        }) {
            self.capture_error(format!("failed to lock focus: {}", e));
        }
    }

    fn run_precapture(&mut self) {
        debug!("Starting precapture sequence");
        let submitted = self.submit_trigger(RequestTag::Precapture, |request| {
            request.ae_precapture_trigger = Some(AePrecaptureTrigger::Start);
        });
        match submitted {
            Ok(()) => self.fsm.precapture_triggered(),
            Err(e) => self.capture_error(format!("failed to start precapture: {}", e)),
        }
    }

    fn capture_still(&mut self) {
        if let Err(e) = self.try_capture_still() {
            self.capture_error(e.to_string());
        }
    }

    fn try_capture_still(&mut self) -> Result<(), CameraError> {
        let options = self.pending_pictures.back().cloned().unwrap_or_default();
        let camera = self.camera.as_ref().ok_or(CameraError::NotOpen)?;
        let handle = self.handle.as_mut().ok_or(CameraError::NotOpen)?;

        let template = handle
            .device
            .create_capture_request(RequestTemplate::StillCapture)?;
        let (session, preview) = handle.live().ok_or(CameraError::NotOpen)?;

        let rotation = output_rotation(
            camera.facing(),
            camera.sensor_orientation,
            self.settings.device_orientation,
        );
        let still = build_still_request(template, preview, self.settings.flash, rotation, &options);
        self.pause_after_capture = options.pause_after_capture;

        if let Err(e) = session.stop_repeating() {
            warn!(error = %e, "Failed to stop preview before capture");
        }
        info!(rotation, quality = ?still.jpeg_quality, "Capturing still picture");
        session.capture(&still)?;
        Ok(())
    }

    /// Log a failed capture and report it; the state machine stays where it is
    fn capture_error(&mut self, message: String) {
        error!(error = %message, state = ?self.fsm.state(), "Still capture failed");
        self.pending_pictures.pop_back();
        self.emit(CameraEvent::PictureFailed {
            message: PhotoError::CaptureFailed(message).to_string(),
        });
    }

    // =========================================================================
    // Capture Results
    // =========================================================================

    fn feed_state_machine(&mut self, result: &CaptureResult) {
        let action = self.fsm.on_capture_result(result);
        self.perform(action);
    }

    pub(crate) fn on_capture_progressed(&mut self, result: &CaptureResult) {
        match result.tag {
            Some(RequestTag::StillCapture) | Some(RequestTag::FocusArea) => {}
            _ => self.feed_state_machine(result),
        }
    }

    pub(crate) fn on_capture_completed(&mut self, result: &CaptureResult) {
        match result.tag {
            Some(RequestTag::StillCapture) => self.on_still_captured(),
            Some(RequestTag::FocusArea) => self.on_focus_area_completed(),
            _ => self.feed_state_machine(result),
        }
    }

    pub(crate) fn on_capture_failed(&mut self, tag: Option<RequestTag>, reason: &str) {
        match tag {
            Some(RequestTag::StillCapture) => self.capture_error(reason.to_string()),
            _ => warn!(?tag, reason, "Capture request failed"),
        }
    }

    fn on_still_captured(&mut self) {
        if std::mem::take(&mut self.pause_after_capture) {
            info!("Still captured, preview stays paused");
            self.pause_preview();
        } else {
            debug!("Still captured");
            self.unlock_focus();
        }
    }

    // =========================================================================
    // Preview Control
    // =========================================================================

    /// Cancel the AF trigger and restart the repeating preview
    pub(crate) fn unlock_focus(&mut self) {
        let auto_focus = self.settings.auto_focus;
        let flash = self.settings.flash;
        let af_modes: &[AfMode] = self
            .camera
            .as_ref()
            .map(|camera| camera.selection.characteristics.af_available_modes.as_slice())
            .unwrap_or(&[]);

        if let Some((session, request)) = self.handle.as_mut().and_then(|handle| handle.live()) {
            let mut cancel = request.tagged(RequestTag::UnlockFocus);
            cancel.af_trigger = Some(AfTrigger::Cancel);
            if let Err(e) = session.capture(&cancel) {
                warn!(error = %e, "Failed to cancel autofocus trigger");
            }

            request.apply_autofocus(auto_focus, af_modes);
            request.apply_flash(flash);
            request.af_trigger = Some(AfTrigger::Idle);
            request.tag = Some(RequestTag::Preview);
            if let Err(e) = session.set_repeating_request(request) {
                warn!(error = %e, "Failed to restart preview");
            }
        }
        self.fsm.unlock();
    }

    pub(crate) fn pause_preview(&mut self) {
        let Some(session) = self
            .handle
            .as_mut()
            .and_then(|handle| handle.session.as_mut())
        else {
            return;
        };
        match session.stop_repeating() {
            Ok(()) => debug!("Preview paused"),
            Err(e) => warn!(error = %e, "Failed to pause preview"),
        }
    }

    pub(crate) fn resume_preview(&mut self) {
        info!("Resuming preview");
        self.unlock_focus();
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// JPEG from the still output: report it, then save on the blocking pool
    pub(crate) fn on_still_image(&mut self, frame: ImageFrame) {
        let device_orientation = self.settings.device_orientation;
        info!(bytes = frame.data.len(), "Still image available");
        self.emit(CameraEvent::PictureTaken {
            data: Arc::clone(&frame.data),
            device_orientation,
            software_rotation: SOFTWARE_ROTATION,
        });

        let Some(options) = self.pending_pictures.pop_front() else {
            debug!("No pending picture request, image not saved");
            return;
        };

        let persistence = Arc::clone(&self.persistence);
        let events = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let event = match persistence.save(&frame.data, &options, device_orientation) {
                Ok(picture) => CameraEvent::PictureSaved { picture },
                Err(e) => {
                    error!(error = %e, "Failed to save picture");
                    CameraEvent::PictureFailed {
                        message: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }

    /// YUV frame from the scan output: preview event, then detectors
    pub(crate) fn on_scan_frame(&mut self, frame: ImageFrame) {
        let Some(camera) = self.camera.as_ref() else {
            return;
        };
        let rotation = detection_rotation(
            self.settings.device_orientation,
            camera.facing(),
            camera.sensor_orientation,
        );

        self.emit(CameraEvent::FramePreview {
            data: Arc::clone(&frame.data),
            width: frame.width,
            height: frame.height,
            orientation: rotation,
        });

        if !self.settings.scanning.any() {
            return;
        }
        let dispatched = self.dispatcher.dispatch(
            ScanFrame {
                data: frame.data,
                width: frame.width,
                height: frame.height,
                rotation,
            },
            self.settings.scanning,
        );
        trace!(dispatched, "Scan frame dispatched");
    }
}
