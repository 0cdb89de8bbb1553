// SPDX-License-Identifier: GPL-3.0-only

//! Platform callback routing

use crate::app::events::CameraEvent;
use crate::app::state::SessionCore;
use crate::backends::camera::DeviceEvent;
use crate::backends::camera::types::ImageFormat;
use crate::errors::CameraError;
use tracing::{debug, info, warn};

impl SessionCore {
    pub(crate) fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Opened(device) => self.on_device_opened(device),
            DeviceEvent::Closed => {
                if self.handle.take().is_some() {
                    info!("Camera closed by platform");
                    self.fsm.unlock();
                    self.emit(CameraEvent::CameraClosed);
                }
            }
            DeviceEvent::Disconnected => {
                warn!("Camera disconnected");
                self.close_device();
                self.mount_error(CameraError::Disconnected);
            }
            DeviceEvent::Error(reason) => {
                warn!(reason = %reason, "Camera device error");
                self.close_device();
                self.mount_error(CameraError::AccessFailed(reason));
            }
            DeviceEvent::SessionConfigured(session) => self.on_session_configured(session),
            DeviceEvent::SessionConfigureFailed(reason) => {
                self.mount_error(CameraError::ConfigurationFailed(reason));
            }
            DeviceEvent::CaptureProgressed(result) => self.on_capture_progressed(&result),
            DeviceEvent::CaptureCompleted(result) => self.on_capture_completed(&result),
            DeviceEvent::CaptureFailed { tag, reason } => self.on_capture_failed(tag, &reason),
            DeviceEvent::ImageAvailable(frame) => match frame.format {
                ImageFormat::Jpeg => self.on_still_image(frame),
                ImageFormat::Yuv420 => self.on_scan_frame(frame),
            },
        }
    }

    /// Drop events that belong to an earlier start or an abandoned session request
    pub(crate) fn handle_tagged_device_event(
        &mut self,
        generation: u64,
        configuration: Option<u64>,
        event: DeviceEvent,
    ) {
        if generation != self.generation {
            debug!(
                event = ?event,
                generation,
                current = self.generation,
                "Ignoring event from previous session"
            );
            release_stale(event);
            return;
        }
        if let Some(configuration) = configuration.filter(|c| *c != self.configuration) {
            debug!(
                event = ?event,
                configuration,
                current = self.configuration,
                "Ignoring outcome of superseded capture session"
            );
            release_stale(event);
            return;
        }
        self.handle_device_event(event);
    }
}

/// Close platform objects carried by an event nobody will use
fn release_stale(event: DeviceEvent) {
    match event {
        DeviceEvent::Opened(mut device) => device.close(),
        DeviceEvent::SessionConfigured(mut session) => session.close(),
        _ => {}
    }
}
