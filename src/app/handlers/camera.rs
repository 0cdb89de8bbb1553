// SPDX-License-Identifier: GPL-3.0-only

//! Camera lifecycle handlers
//!
//! Handles start and stop, capture session creation once the device is
//! open, and the close/rebuild/reopen cycle used when outputs change.

use crate::app::events::CameraEvent;
use crate::app::state::{ActiveCamera, SessionCore, SessionHandle};
use crate::backends::camera::enumeration::{StreamSizes, choose_camera, choose_optimal_size};
use crate::backends::camera::types::{ImageFormat, RequestTag};
use crate::backends::camera::{CameraDevice, CaptureSession, SessionOutput};
use crate::constants::{DEFAULT_MAX_DIGITAL_ZOOM, IMAGE_OUTPUT_MAX_IMAGES};
use crate::errors::{CameraError, PhotoError};
use crate::pipelines::photo::{OutputTarget, RequestTemplate};
use tracing::{debug, error, info, warn};

impl SessionCore {
    // =========================================================================
    // Start / Stop
    // =========================================================================

    pub(crate) fn start(&mut self) {
        if self.camera.is_some() {
            debug!("Camera already started, restarting");
            self.stop();
        }
        self.generation += 1;
        self.mount_error_reported = false;

        if let Err(e) = self.try_start() {
            self.close_outputs();
            self.camera = None;
            self.mount_error(e);
        }
    }

    fn try_start(&mut self) -> Result<(), CameraError> {
        let selection = choose_camera(
            self.provider.as_ref(),
            self.settings.camera_id.as_deref(),
            self.settings.facing,
        )?;
        let sensor_orientation = selection
            .characteristics
            .sensor_orientation
            .ok_or(CameraError::CharacteristicsMissing("sensor orientation"))?;
        let sizes = StreamSizes::collect(&selection.characteristics)?;

        let aspect_ratio = sizes.resolve_aspect_ratio(self.settings.aspect_ratio);
        if aspect_ratio != self.settings.aspect_ratio {
            info!(
                requested = %self.settings.aspect_ratio,
                using = %aspect_ratio,
                "Aspect ratio not supported by camera"
            );
            self.settings.aspect_ratio = aspect_ratio;
        }
        self.settings.facing = selection.facing;

        let camera_id = selection.camera_id.clone();
        info!(
            camera_id = %camera_id,
            facing = %selection.facing,
            sensor_orientation,
            aspect_ratio = %aspect_ratio,
            "Starting camera"
        );
        self.camera = Some(ActiveCamera {
            selection,
            sensor_orientation,
            sizes,
        });

        self.create_outputs()?;
        let sink = self.device_sink();
        self.provider.open_camera(&camera_id, sink)?;
        Ok(())
    }

    /// Release session, device, still output and scan output, in that order
    pub(crate) fn stop(&mut self) {
        self.generation += 1;

        let was_open = self.handle.is_some();
        if let Some(mut handle) = self.handle.take() {
            if let Some(mut session) = handle.session.take() {
                session.close();
            }
            handle.device.close();
        }
        self.close_outputs();

        self.camera = None;
        self.preview_size = None;
        self.initial_crop_region = None;
        self.fsm.unlock();
        self.fail_pending_pictures("camera stopped");

        if was_open {
            info!("Camera closed");
            self.emit(CameraEvent::CameraClosed);
        }
    }

    fn close_outputs(&mut self) {
        if let Some(mut output) = self.still_output.take() {
            output.close();
        }
        if let Some(mut output) = self.scan_output.take() {
            output.close();
        }
    }

    /// Create the JPEG still output and the YUV scan output for the current settings
    fn create_outputs(&mut self) -> Result<(), CameraError> {
        let camera = self.camera.as_ref().ok_or(CameraError::NotOpen)?;
        let ratio = self.settings.aspect_ratio;
        let still_size = camera
            .sizes
            .picture_size(&ratio, self.settings.picture_size)
            .ok_or(CameraError::CharacteristicsMissing("picture stream sizes"))?;
        let scan_size = camera
            .sizes
            .scan_size(&ratio)
            .ok_or(CameraError::CharacteristicsMissing("preview stream sizes"))?;

        self.close_outputs();
        debug!(%still_size, %scan_size, "Creating image outputs");
        self.still_output = Some(self.provider.create_image_output(
            OutputTarget::StillImage,
            still_size,
            ImageFormat::Jpeg,
            IMAGE_OUTPUT_MAX_IMAGES,
        )?);
        self.scan_output = Some(self.provider.create_image_output(
            OutputTarget::ScanImage,
            scan_size,
            ImageFormat::Yuv420,
            IMAGE_OUTPUT_MAX_IMAGES,
        )?);
        Ok(())
    }

    // =========================================================================
    // Capture Session
    // =========================================================================

    pub(crate) fn on_device_opened(&mut self, device: Box<dyn CameraDevice>) {
        info!(camera_id = device.id(), "Camera opened");
        self.handle = Some(SessionHandle::new(device));
        self.emit(CameraEvent::CameraOpened);
        self.start_capture_session();
    }

    /// Create a capture session over preview, still and scan outputs
    ///
    /// Deferred until a preview surface size is known.
    pub(crate) fn start_capture_session(&mut self) {
        if let Err(e) = self.try_start_capture_session() {
            self.mount_error(e);
        }
    }

    fn try_start_capture_session(&mut self) -> Result<(), CameraError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        let (Some(camera), Some(still), Some(scan)) = (
            self.camera.as_ref(),
            self.still_output.as_ref(),
            self.scan_output.as_ref(),
        ) else {
            return Ok(());
        };
        let Some(surface) = self.preview_surface else {
            debug!("No preview surface yet, capture session deferred");
            return Ok(());
        };

        let candidates = camera.sizes.preview.sizes(&self.settings.aspect_ratio);
        let preview_size = choose_optimal_size(&candidates, surface)
            .ok_or(CameraError::CharacteristicsMissing("preview stream sizes"))?;
        self.preview_size = Some(preview_size);

        let outputs = [
            SessionOutput {
                target: OutputTarget::Preview,
                size: preview_size,
            },
            SessionOutput {
                target: still.target(),
                size: still.size(),
            },
            SessionOutput {
                target: scan.target(),
                size: scan.size(),
            },
        ];

        let mut request = handle
            .device
            .create_capture_request(RequestTemplate::Preview)
            .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
        request.add_target(OutputTarget::Preview);
        if self.settings.scanning.any() {
            request.add_target(OutputTarget::ScanImage);
        }
        handle.preview_request = Some(request);

        self.configuration += 1;
        debug!(
            %preview_size,
            %surface,
            configuration = self.configuration,
            "Creating capture session"
        );
        let sink = self.session_sink();
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        handle.device.create_capture_session(&outputs, sink)?;
        Ok(())
    }

    /// Apply all settings to the fresh preview request and start the preview
    pub(crate) fn on_session_configured(&mut self, mut session: Box<dyn CaptureSession>) {
        let Some(handle) = self.handle.as_mut() else {
            debug!("Session configured after device closed");
            session.close();
            return;
        };
        let (Some(camera), Some(request)) = (self.camera.as_ref(), handle.preview_request.as_mut())
        else {
            session.close();
            return;
        };

        let characteristics = &camera.selection.characteristics;
        self.initial_crop_region = request.crop_region;

        self.settings.auto_focus = request.apply_autofocus(
            self.settings.auto_focus,
            &characteristics.af_available_modes,
        );
        request.apply_flash(self.settings.flash);
        let focus = request.apply_focus_depth(
            self.settings.focus_depth,
            self.settings.auto_focus,
            characteristics.minimum_focus_distance,
        );
        request.apply_white_balance(self.settings.white_balance);
        request.apply_zoom(
            self.settings.zoom,
            characteristics.active_array_size,
            characteristics
                .max_digital_zoom
                .unwrap_or(DEFAULT_MAX_DIGITAL_ZOOM),
            self.initial_crop_region,
        );
        request.tag = Some(RequestTag::Preview);

        if let Some(mut previous) = handle.session.take() {
            debug!("Closing replaced capture session");
            previous.close();
        }
        let started = focus.and_then(|()| {
            session
                .set_repeating_request(request)
                .map_err(|e| e.to_string())
        });
        handle.session = Some(session);

        match started {
            Ok(()) => {
                self.fsm.unlock();
                info!("Preview started");
            }
            Err(e) => self.mount_error(CameraError::ConfigurationFailed(e)),
        }
    }

    /// Stop repeating, close the session, rebuild outputs and reopen
    pub(crate) fn reconfigure(&mut self) {
        if self.camera.is_none() {
            return;
        }
        debug!("Reconfiguring capture session");

        if let Some(handle) = self.handle.as_mut() {
            if let Some(mut session) = handle.session.take() {
                if let Err(e) = session.stop_repeating() {
                    warn!(error = %e, "Failed to stop repeating request");
                }
                session.close();
            }
            handle.preview_request = None;
        }
        self.fsm.unlock();
        self.fail_pending_pictures("capture session reconfigured");

        if let Err(e) = self.create_outputs() {
            self.mount_error(e);
            return;
        }
        self.start_capture_session();
    }

    // =========================================================================
    // Failures
    // =========================================================================

    /// Close the device after an access error or disconnect
    pub(crate) fn close_device(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Some(mut session) = handle.session.take() {
                session.close();
            }
            handle.device.close();
        }
        self.fsm.unlock();
    }

    /// Report a mount error, at most once per start
    pub(crate) fn mount_error(&mut self, error: CameraError) {
        error!(error = %error, "Camera mount failed");
        if self.mount_error_reported {
            return;
        }
        self.mount_error_reported = true;
        self.emit(CameraEvent::MountError {
            message: error.to_string(),
        });
    }

    /// Drop every queued picture, reporting each as failed
    pub(crate) fn fail_pending_pictures(&mut self, reason: &str) {
        for _ in std::mem::take(&mut self.pending_pictures) {
            warn!(reason, "Pending picture dropped");
            self.emit(CameraEvent::PictureFailed {
                message: PhotoError::CaptureFailed(reason.to_string()).to_string(),
            });
        }
    }
}
