// SPDX-License-Identifier: GPL-3.0-only

//! Session state owned by the session thread

use crate::app::events::{CameraEvent, EventSender};
use crate::app::frame_processor::{FaceDetectorSettings, FrameDispatcher, ScanningFlags};
use crate::app::{Command, CommandSender};
use crate::backends::camera::enumeration::{CameraSelection, StreamSizes};
use crate::backends::camera::types::{AspectRatio, Facing, Rect, Size};
use crate::backends::camera::{
    CameraDevice, CameraProvider, CaptureSession, DeviceEventSink, ImageOutput,
};
use crate::config::Config;
use crate::pipelines::photo::{
    CaptureRequestConfig, CaptureStateMachine, Flash, PictureOptions, WhiteBalance,
};
use crate::storage::PicturePersistence;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

/// Caller-visible settings
///
/// Getters return these values. A setter whose request could not be
/// applied leaves its value unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    pub facing: Facing,
    pub camera_id: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub flash: Flash,
    /// Effective autofocus; forced off on fixed-focus lenses
    pub auto_focus: bool,
    pub focus_depth: f32,
    pub zoom: f32,
    pub white_balance: WhiteBalance,
    pub picture_size: Option<Size>,
    pub scanning: ScanningFlags,
    pub face_detection: FaceDetectorSettings,
    /// Device rotation in degrees, one of 0, 90, 180, 270
    pub device_orientation: i32,
}

impl From<&Config> for CameraSettings {
    fn from(config: &Config) -> Self {
        Self {
            facing: config.facing,
            camera_id: config.camera_id.clone(),
            aspect_ratio: config.aspect_ratio,
            flash: config.flash,
            auto_focus: config.auto_focus,
            focus_depth: config.focus_depth,
            zoom: config.zoom,
            white_balance: config.white_balance,
            picture_size: config.picture_size,
            scanning: config.scanning,
            face_detection: config.face_detection,
            device_orientation: 0,
        }
    }
}

/// Camera chosen by the last start
pub struct ActiveCamera {
    pub selection: CameraSelection,
    pub sensor_orientation: i32,
    pub sizes: StreamSizes,
}

impl ActiveCamera {
    pub fn facing(&self) -> Facing {
        self.selection.facing
    }

    pub fn active_array(&self) -> Option<Rect> {
        self.selection.characteristics.active_array_size
    }
}

/// Open device and its capture session
///
/// Dropped as a whole on stop, error and disconnect.
pub struct SessionHandle {
    pub device: Box<dyn CameraDevice>,
    pub session: Option<Box<dyn CaptureSession>>,
    /// The repeating preview request; built once per session and then
    /// mutated in place by the setters
    pub preview_request: Option<CaptureRequestConfig>,
}

impl SessionHandle {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            session: None,
            preview_request: None,
        }
    }

    /// Session and preview request, once the session is configured
    pub fn live(&mut self) -> Option<(&mut Box<dyn CaptureSession>, &mut CaptureRequestConfig)> {
        match (self.session.as_mut(), self.preview_request.as_mut()) {
            (Some(session), Some(request)) => Some((session, request)),
            _ => None,
        }
    }
}

/// Everything the session thread owns
pub struct SessionCore {
    pub(crate) provider: Box<dyn CameraProvider>,
    pub(crate) settings: CameraSettings,
    pub(crate) events: EventSender,
    pub(crate) commands: CommandSender,
    pub(crate) dispatcher: FrameDispatcher,
    pub(crate) persistence: Arc<dyn PicturePersistence>,
    pub(crate) runtime: Handle,

    /// Bumped on every start and stop; device events from older
    /// generations are discarded
    pub(crate) generation: u64,
    /// Bumped for every capture session requested; only the newest
    /// configure result is kept
    pub(crate) configuration: u64,
    pub(crate) mount_error_reported: bool,

    pub(crate) camera: Option<ActiveCamera>,
    pub(crate) handle: Option<SessionHandle>,
    pub(crate) still_output: Option<Box<dyn ImageOutput>>,
    pub(crate) scan_output: Option<Box<dyn ImageOutput>>,
    /// Crop region of the preview template, restored at zoom 0
    pub(crate) initial_crop_region: Option<Rect>,
    pub(crate) preview_surface: Option<Size>,
    pub(crate) preview_size: Option<Size>,

    pub(crate) fsm: CaptureStateMachine,
    /// Options of pictures whose JPEG has not arrived yet, oldest first
    pub(crate) pending_pictures: VecDeque<PictureOptions>,
    /// Stop the preview instead of unlocking focus once the still completes
    pub(crate) pause_after_capture: bool,
}

impl SessionCore {
    pub(crate) fn new(
        provider: Box<dyn CameraProvider>,
        config: &Config,
        events: EventSender,
        commands: CommandSender,
        dispatcher: FrameDispatcher,
        persistence: Arc<dyn PicturePersistence>,
        runtime: Handle,
    ) -> Self {
        Self {
            provider,
            settings: CameraSettings::from(config),
            events,
            commands,
            dispatcher,
            persistence,
            runtime,
            generation: 0,
            configuration: 0,
            mount_error_reported: false,
            camera: None,
            handle: None,
            still_output: None,
            scan_output: None,
            initial_crop_region: None,
            preview_surface: None,
            preview_size: None,
            fsm: CaptureStateMachine::new(),
            pending_pictures: VecDeque::new(),
            pause_after_capture: false,
        }
    }

    pub(crate) fn emit(&self, event: CameraEvent) {
        if self.events.send(event).is_err() {
            warn!("Event receiver dropped");
        }
    }

    /// Sink handed to the platform for the current generation
    pub(crate) fn device_sink(&self) -> DeviceEventSink {
        self.tagged_sink(None)
    }

    /// Sink for the outcome of the capture session requested last
    pub(crate) fn session_sink(&self) -> DeviceEventSink {
        self.tagged_sink(Some(self.configuration))
    }

    fn tagged_sink(&self, configuration: Option<u64>) -> DeviceEventSink {
        let commands = self.commands.clone();
        let generation = self.generation;
        DeviceEventSink::new(move |event| {
            // The session thread may already be gone during teardown
            let _ = commands.send(Command::Device {
                generation,
                configuration,
                event,
            });
        })
    }

    pub(crate) fn is_camera_opened(&self) -> bool {
        self.handle.is_some()
    }

    /// Flash unit on the started camera; before start, on any camera
    pub(crate) fn has_flash(&self) -> bool {
        if let Some(camera) = self.camera.as_ref() {
            return camera.selection.characteristics.flash_available == Some(true);
        }
        let Ok(ids) = self.provider.camera_ids() else {
            return false;
        };
        ids.iter().any(|id| {
            self.provider
                .characteristics(id)
                .is_ok_and(|c| c.flash_available == Some(true))
        })
    }

    /// A configured session with a preview request exists
    pub(crate) fn is_session_live(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.session.is_some() && h.preview_request.is_some())
    }
}
