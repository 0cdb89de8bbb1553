// SPDX-License-Identifier: GPL-3.0-only

//! Camera control handlers
//!
//! Setters update the caller-visible setting and the preview request, then
//! re-apply the repeating request. When that fails both are put back.
//! Changes that need different outputs go through a full reconfigure.

use crate::app::frame_processor::{FaceDetectorSettings, ScanningFlags};
use crate::app::state::SessionCore;
use crate::backends::camera::types::{
    AfMode, AfTrigger, AspectRatio, CameraCharacteristics, Facing, Rect, RequestTag, Size,
};
use crate::config::clamp_unit;
use crate::constants::DEFAULT_MAX_DIGITAL_ZOOM;
use crate::errors::CameraError;
use crate::pipelines::photo::request::focus_area;
use crate::pipelines::photo::{CaptureRequestConfig, Flash, WhiteBalance};
use tracing::{debug, info, warn};

/// Read-only data an update function may need
pub(crate) struct RequestContext<'a> {
    pub characteristics: &'a CameraCharacteristics,
    pub initial_crop_region: Option<Rect>,
}

impl RequestContext<'_> {
    fn max_digital_zoom(&self) -> f32 {
        self.characteristics
            .max_digital_zoom
            .unwrap_or(DEFAULT_MAX_DIGITAL_ZOOM)
    }
}

impl SessionCore {
    // =========================================================================
    // Request Updates
    // =========================================================================

    /// Update the live preview request and re-apply it
    ///
    /// Without a configured session this is a no-op and the setting alone
    /// changes; it is applied when the next session is configured. On
    /// failure the request is restored and the error returned so the caller
    /// can restore its setting.
    fn update_preview(
        &mut self,
        update: impl FnOnce(&mut CaptureRequestConfig, &RequestContext<'_>) -> Result<(), String>,
    ) -> Result<(), CameraError> {
        let Some(camera) = self.camera.as_ref() else {
            return Ok(());
        };
        let Some((session, request)) = self.handle.as_mut().and_then(|handle| handle.live())
        else {
            return Ok(());
        };
        let context = RequestContext {
            characteristics: &camera.selection.characteristics,
            initial_crop_region: self.initial_crop_region,
        };

        let previous = request.clone();
        let applied = update(&mut *request, &context).and_then(|()| {
            session
                .set_repeating_request(request)
                .map_err(|e| e.to_string())
        });
        if let Err(e) = applied {
            *request = previous;
            return Err(CameraError::ConfigurationFailed(e));
        }
        Ok(())
    }

    pub(crate) fn set_flash(&mut self, flash: Flash) {
        let previous = self.settings.flash;
        if previous == flash {
            return;
        }
        self.settings.flash = flash;
        if let Err(e) = self.update_preview(|request, _| {
            request.apply_flash(flash);
            Ok(())
        }) {
            warn!(error = %e, ?flash, "Failed to apply flash, keeping previous value");
            self.settings.flash = previous;
        }
    }

    /// Flash from its integer constant; unknown values are ignored
    pub(crate) fn set_flash_raw(&mut self, value: i32) {
        match Flash::from_raw(value) {
            Some(flash) => self.set_flash(flash),
            None => warn!(value, "Unknown flash mode ignored"),
        }
    }

    pub(crate) fn set_auto_focus(&mut self, auto_focus: bool) {
        let previous = self.settings.auto_focus;
        if previous == auto_focus {
            return;
        }
        self.settings.auto_focus = auto_focus;

        let mut effective = auto_focus;
        let focus_depth = self.settings.focus_depth;
        let result = self.update_preview(|request, context| {
            effective =
                request.apply_autofocus(auto_focus, &context.characteristics.af_available_modes);
            request.apply_focus_depth(
                focus_depth,
                effective,
                context.characteristics.minimum_focus_distance,
            )
        });
        match result {
            Ok(()) => self.settings.auto_focus = effective,
            Err(e) => {
                warn!(error = %e, auto_focus, "Failed to apply autofocus, keeping previous value");
                self.settings.auto_focus = previous;
            }
        }
    }

    pub(crate) fn set_focus_depth(&mut self, depth: f32) {
        let depth = clamp_unit(depth);
        let previous = self.settings.focus_depth;
        if previous == depth {
            return;
        }
        self.settings.focus_depth = depth;
        let auto_focus = self.settings.auto_focus;
        if let Err(e) = self.update_preview(|request, context| {
            request.apply_focus_depth(
                depth,
                auto_focus,
                context.characteristics.minimum_focus_distance,
            )
        }) {
            warn!(error = %e, depth, "Failed to apply focus depth, keeping previous value");
            self.settings.focus_depth = previous;
        }
    }

    pub(crate) fn set_zoom(&mut self, zoom: f32) {
        let zoom = clamp_unit(zoom);
        let previous = self.settings.zoom;
        if previous == zoom {
            return;
        }
        self.settings.zoom = zoom;
        if let Err(e) = self.update_preview(|request, context| {
            request.apply_zoom(
                zoom,
                context.characteristics.active_array_size,
                context.max_digital_zoom(),
                context.initial_crop_region,
            );
            Ok(())
        }) {
            warn!(error = %e, zoom, "Failed to apply zoom, keeping previous value");
            self.settings.zoom = previous;
        }
    }

    pub(crate) fn set_white_balance(&mut self, white_balance: WhiteBalance) {
        let previous = self.settings.white_balance;
        if previous == white_balance {
            return;
        }
        self.settings.white_balance = white_balance;
        if let Err(e) = self.update_preview(|request, _| {
            request.apply_white_balance(white_balance);
            Ok(())
        }) {
            warn!(error = %e, ?white_balance, "Failed to apply white balance, keeping previous value");
            self.settings.white_balance = previous;
        }
    }

    /// White balance from its integer constant; unknown values are ignored
    pub(crate) fn set_white_balance_raw(&mut self, value: i32) {
        match WhiteBalance::from_raw(value) {
            Some(white_balance) => self.set_white_balance(white_balance),
            None => warn!(value, "Unknown white balance mode ignored"),
        }
    }

    // =========================================================================
    // Tap To Focus
    // =========================================================================

    /// Focus on a normalized preview point
    ///
    /// Cancels any running AF scan, sets the metering region when the lens
    /// supports one, and fires an AF trigger. The repeating request is put
    /// back once the trigger completes.
    pub(crate) fn set_focus_area(&mut self, x: f32, y: f32) {
        let (x, y) = (clamp_unit(x), clamp_unit(y));
        let Some(camera) = self.camera.as_ref() else {
            return;
        };
        let max_af_regions = camera.selection.characteristics.max_af_regions;
        let Some(active_array) = camera.active_array() else {
            warn!("No active array size, tap to focus unavailable");
            return;
        };
        let Some((session, request)) = self.handle.as_mut().and_then(|handle| handle.live())
        else {
            debug!("No capture session, focus point ignored");
            return;
        };

        if let Err(e) = session.stop_repeating() {
            warn!(error = %e, "Failed to stop preview for focus");
        }

        let mut cancel = request.tagged(RequestTag::UnlockFocus);
        cancel.af_trigger = Some(AfTrigger::Cancel);
        cancel.af_mode = AfMode::Off;
        if let Err(e) = session.capture(&cancel) {
            warn!(error = %e, "Failed to cancel autofocus");
        }

        if max_af_regions > 0 {
            request.af_regions = vec![focus_area(x, y, active_array)];
        }
        request.af_mode = AfMode::Auto;

        let mut trigger = request.tagged(RequestTag::FocusArea);
        trigger.af_trigger = Some(AfTrigger::Start);
        debug!(x, y, "Focusing on point");
        if let Err(e) = session.capture(&trigger) {
            warn!(error = %e, "Failed to trigger focus, restoring preview");
            if let Err(e) = session.set_repeating_request(request) {
                warn!(error = %e, "Failed to restore preview");
            }
        }
    }

    pub(crate) fn on_focus_area_completed(&mut self) {
        let Some((session, request)) = self.handle.as_mut().and_then(|handle| handle.live())
        else {
            return;
        };
        request.af_trigger = Some(AfTrigger::Idle);
        if let Err(e) = session.set_repeating_request(request) {
            warn!(error = %e, "Failed to restore preview after focus");
        }
    }

    // =========================================================================
    // Camera And Output Selection
    // =========================================================================

    pub(crate) fn set_facing(&mut self, facing: Facing) {
        if self.settings.facing == facing {
            return;
        }
        info!(%facing, "Switching camera facing");
        self.settings.facing = facing;
        self.restart_if_started();
    }

    pub(crate) fn set_camera_id(&mut self, camera_id: Option<String>) {
        if self.settings.camera_id == camera_id {
            return;
        }
        info!(camera_id = ?camera_id, "Switching camera");
        self.settings.camera_id = camera_id;
        self.restart_if_started();
    }

    fn restart_if_started(&mut self) {
        if self.camera.is_some() {
            self.stop();
            self.start();
        }
    }

    pub(crate) fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        if self.settings.aspect_ratio == ratio {
            return;
        }
        if let Some(camera) = self.camera.as_ref() {
            if !camera.sizes.preview.contains(&ratio) {
                warn!(%ratio, "Aspect ratio not supported, ignored");
                return;
            }
            if let Some(size) = self.settings.picture_size {
                if !ratio.matches(size) {
                    debug!(%size, "Picture size does not match new aspect ratio, cleared");
                    self.settings.picture_size = None;
                }
            }
        }
        info!(%ratio, "Aspect ratio changed");
        self.settings.aspect_ratio = ratio;
        self.reconfigure();
    }

    pub(crate) fn set_picture_size(&mut self, size: Option<Size>) {
        if self.settings.picture_size == size {
            return;
        }
        if let (Some(camera), Some(requested)) = (self.camera.as_ref(), size) {
            let available = camera.sizes.picture.sizes(&self.settings.aspect_ratio);
            if !available.contains(&requested) {
                warn!(%requested, "Picture size not available for aspect ratio, ignored");
                return;
            }
        }
        self.settings.picture_size = size;
        self.reconfigure();
    }

    pub(crate) fn set_scanning(&mut self, scanning: ScanningFlags) {
        let was_scanning = self.settings.scanning.any();
        self.settings.scanning = scanning;
        for kind in crate::app::frame_processor::DetectorKind::ALL {
            if scanning.enables(kind) && !self.dispatcher.has_detector(kind) {
                warn!(?kind, "Scanning enabled without a registered detector");
            }
        }
        if was_scanning != scanning.any() {
            info!(scanning = scanning.any(), "Scanning mode changed");
            self.reconfigure();
        }
    }

    pub(crate) fn set_face_detector_settings(&mut self, settings: FaceDetectorSettings) {
        self.settings.face_detection = settings;
        self.dispatcher.configure(settings);
    }

    // =========================================================================
    // Orientation And Surface
    // =========================================================================

    pub(crate) fn set_device_orientation(&mut self, degrees: i32) {
        let normalized = degrees.rem_euclid(360);
        if normalized % 90 != 0 {
            warn!(degrees, "Device orientation must be a multiple of 90, ignored");
            return;
        }
        self.settings.device_orientation = normalized;
    }

    pub(crate) fn set_preview_surface(&mut self, size: Size) {
        if self.preview_surface == Some(size) {
            return;
        }
        debug!(%size, "Preview surface changed");
        self.preview_surface = Some(size);
        if self.is_session_live() {
            self.reconfigure();
        } else if self.is_camera_opened() {
            self.start_capture_session();
        }
    }
}
