// SPDX-License-Identifier: GPL-3.0-only

//! Camera session
//!
//! A [`CameraSession`] owns one session thread. Every public method posts a
//! command onto the thread's queue, so all camera state is touched from that
//! thread only. Platform callbacks are posted onto the same queue, tagged
//! with the generation of the start that produced them.
//!
//! ```text
//! caller ──setters/queries──▶ ┌──────────────┐ ──CameraEvent──▶ EventReceiver
//!                             │ session      │
//! platform ──DeviceEvent────▶ │ thread       │ ──ScanFrame──▶ FrameDispatcher
//!                             └──────────────┘
//! ```

pub mod events;
pub mod frame_processor;
pub mod handlers;
pub mod state;

pub use events::{CameraEvent, EventReceiver, EventSender};
pub use state::CameraSettings;

use crate::backends::camera::enumeration::{CameraInfo, list_cameras};
use crate::backends::camera::types::{AspectRatio, Facing, Size};
use crate::backends::camera::{CameraProvider, DeviceEvent};
use crate::config::Config;
use crate::constants::SESSION_THREAD_NAME;
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::{CaptureState, Flash, PictureOptions, WhiteBalance};
use crate::storage::{FileStorage, PicturePersistence};
use frame_processor::qr_detector::QrDetector;
use frame_processor::{FaceDetectorSettings, FrameDispatcher, ScanningFlags, VisionDetector};
use state::SessionCore;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Work for the session thread
pub(crate) enum Command {
    Run(Box<dyn FnOnce(&mut SessionCore) + Send>),
    Device {
        generation: u64,
        /// Set for the outcome of a capture session request
        configuration: Option<u64>,
        event: DeviceEvent,
    },
    Shutdown,
}

pub(crate) type CommandSender = mpsc::UnboundedSender<Command>;

/// Builder for a [`CameraSession`]
pub struct SessionBuilder {
    provider: Box<dyn CameraProvider>,
    config: Config,
    detectors: Vec<Arc<dyn VisionDetector>>,
    persistence: Option<Arc<dyn PicturePersistence>>,
    runtime: Option<Handle>,
    qr_detector: bool,
}

impl SessionBuilder {
    pub fn new(provider: Box<dyn CameraProvider>) -> Self {
        Self {
            provider,
            config: Config::default(),
            detectors: Vec::new(),
            persistence: None,
            runtime: None,
            qr_detector: true,
        }
    }

    /// Initial settings
    pub fn config(mut self, config: Config) -> Self {
        self.config = config.sanitized();
        self
    }

    /// Register a detector; replaces the built-in one of the same kind
    pub fn detector(mut self, detector: Arc<dyn VisionDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Skip registering the built-in QR code detector
    pub fn without_qr_detector(mut self) -> Self {
        self.qr_detector = false;
        self
    }

    /// Where pictures are saved; defaults to files in the configured photo directory
    pub fn persistence(mut self, persistence: Arc<dyn PicturePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Runtime whose blocking pool runs detectors and picture saving
    ///
    /// Defaults to the runtime the builder is spawned from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Start the session thread
    pub fn spawn(self) -> AppResult<(CameraSession, EventReceiver)> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                AppError::Other(format!("camera session needs a tokio runtime: {}", e))
            })?,
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();

        let mut dispatcher = FrameDispatcher::new(runtime.clone(), event_tx.clone());
        dispatcher.configure(self.config.face_detection);
        if self.qr_detector {
            dispatcher.register(Arc::new(QrDetector));
        }
        for detector in self.detectors {
            dispatcher.register(detector);
        }

        let persistence = self
            .persistence
            .unwrap_or_else(|| Arc::new(FileStorage::new(self.config.photo_directory())));

        let mut core = SessionCore::new(
            self.provider,
            &self.config,
            event_tx,
            command_tx.clone(),
            dispatcher,
            persistence,
            runtime,
        );

        let thread = std::thread::Builder::new()
            .name(SESSION_THREAD_NAME.into())
            .spawn(move || {
                debug!("Session thread started");
                while let Some(command) = command_rx.blocking_recv() {
                    match command {
                        Command::Run(work) => work(&mut core),
                        Command::Device {
                            generation,
                            configuration,
                            event,
                        } => core.handle_tagged_device_event(generation, configuration, event),
                        Command::Shutdown => break,
                    }
                }
                core.stop();
                debug!("Session thread exiting");
            })
            .map_err(|e| AppError::Other(format!("failed to spawn session thread: {}", e)))?;

        info!("Camera session created");
        Ok((
            CameraSession {
                commands: command_tx,
                thread: Some(thread),
            },
            event_rx,
        ))
    }
}

/// Handle to a running camera session
///
/// Commands are executed in the order they are posted. Queries wait for
/// every earlier command to finish; events those commands trigger later
/// (device opened, pictures saved) arrive on the [`EventReceiver`].
///
/// Queries block the calling thread and must not be called from inside an
/// async task.
pub struct CameraSession {
    commands: CommandSender,
    thread: Option<JoinHandle<()>>,
}

impl CameraSession {
    pub fn builder(provider: Box<dyn CameraProvider>) -> SessionBuilder {
        SessionBuilder::new(provider)
    }

    fn post(&self, work: impl FnOnce(&mut SessionCore) + Send + 'static) {
        if self.commands.send(Command::Run(Box::new(work))).is_err() {
            error!("Session thread is gone, command dropped");
        }
    }

    fn query<T: Send + 'static>(
        &self,
        read: impl FnOnce(&SessionCore) -> T + Send + 'static,
    ) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Run(Box::new(move |core: &mut SessionCore| {
                let _ = tx.send(read(&*core));
            })))
            .map_err(|_| AppError::Other("camera session has shut down".into()))?;
        rx.blocking_recv()
            .map_err(|_| AppError::Other("camera session has shut down".into()))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the selected camera; restarts if already started
    pub fn start(&self) {
        self.post(SessionCore::start);
    }

    /// Release everything; safe to call repeatedly
    pub fn stop(&self) {
        self.post(SessionCore::stop);
    }

    /// Size of the surface the preview is drawn on
    ///
    /// The capture session is only created once this is known.
    pub fn set_preview_surface(&self, size: Size) {
        self.post(move |core| core.set_preview_surface(size));
    }

    /// Stop the session thread, releasing the camera
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if thread.join().is_err() {
            error!("Session thread panicked");
        }
    }

    // =========================================================================
    // Capture
    // =========================================================================

    pub fn take_picture(&self, options: PictureOptions) {
        self.post(move |core| core.take_picture(options));
    }

    pub fn pause_preview(&self) {
        self.post(SessionCore::pause_preview);
    }

    pub fn resume_preview(&self) {
        self.post(SessionCore::resume_preview);
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_facing(&self, facing: Facing) {
        self.post(move |core| core.set_facing(facing));
    }

    /// Pin a camera by id; `None` selects by facing again
    pub fn set_camera_id(&self, camera_id: Option<String>) {
        self.post(move |core| core.set_camera_id(camera_id));
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.post(move |core| core.set_aspect_ratio(ratio));
    }

    /// Explicit picture size; `None` uses the largest for the aspect ratio
    pub fn set_picture_size(&self, size: Option<Size>) {
        self.post(move |core| core.set_picture_size(size));
    }

    pub fn set_flash(&self, flash: Flash) {
        self.post(move |core| core.set_flash(flash));
    }

    pub fn set_flash_raw(&self, value: i32) {
        self.post(move |core| core.set_flash_raw(value));
    }

    pub fn set_auto_focus(&self, auto_focus: bool) {
        self.post(move |core| core.set_auto_focus(auto_focus));
    }

    pub fn set_focus_depth(&self, depth: f32) {
        self.post(move |core| core.set_focus_depth(depth));
    }

    pub fn set_zoom(&self, zoom: f32) {
        self.post(move |core| core.set_zoom(zoom));
    }

    pub fn set_white_balance(&self, white_balance: WhiteBalance) {
        self.post(move |core| core.set_white_balance(white_balance));
    }

    pub fn set_white_balance_raw(&self, value: i32) {
        self.post(move |core| core.set_white_balance_raw(value));
    }

    /// Tap to focus at normalized preview coordinates
    pub fn set_focus_area(&self, x: f32, y: f32) {
        self.post(move |core| core.set_focus_area(x, y));
    }

    pub fn set_device_orientation(&self, degrees: i32) {
        self.post(move |core| core.set_device_orientation(degrees));
    }

    pub fn set_scanning(&self, scanning: ScanningFlags) {
        self.post(move |core| core.set_scanning(scanning));
    }

    /// Options for the registered face detector
    pub fn set_face_detector_settings(&self, settings: FaceDetectorSettings) {
        self.post(move |core| core.set_face_detector_settings(settings));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn settings(&self) -> AppResult<CameraSettings> {
        self.query(|core| core.settings.clone())
    }

    pub fn capture_state(&self) -> AppResult<CaptureState> {
        self.query(|core| core.fsm.state())
    }

    /// Whether the started camera, or before start any camera, has a flash unit
    pub fn has_flash(&self) -> AppResult<bool> {
        self.query(|core| core.has_flash())
    }

    pub fn is_camera_opened(&self) -> AppResult<bool> {
        self.query(|core| core.is_camera_opened())
    }

    /// A capture session is configured and the preview request is set
    pub fn is_preview_running(&self) -> AppResult<bool> {
        self.query(|core| core.is_session_live())
    }

    /// Aspect ratios of the started camera, ascending
    pub fn supported_aspect_ratios(&self) -> AppResult<Vec<AspectRatio>> {
        self.query(|core| {
            core.camera
                .as_ref()
                .map(|camera| camera.sizes.preview.ratios().collect())
                .unwrap_or_default()
        })
    }

    pub fn available_picture_sizes(&self, ratio: AspectRatio) -> AppResult<Vec<Size>> {
        self.query(move |core| {
            core.camera
                .as_ref()
                .map(|camera| camera.sizes.picture.sizes(&ratio))
                .unwrap_or_default()
        })
    }

    /// Cameras reported by the provider
    pub fn camera_ids(&self) -> AppResult<Vec<CameraInfo>> {
        let cameras = self.query(|core| list_cameras(core.provider.as_ref()))?;
        Ok(cameras?)
    }

    /// Preview size chosen for the current surface
    pub fn preview_size(&self) -> AppResult<Option<Size>> {
        self.query(|core| core.preview_size)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.join();
    }
}
