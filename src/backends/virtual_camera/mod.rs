// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! A scripted, in-process implementation of the camera traits. Devices
//! open and configure immediately; capture results and scan frames are
//! injected through a [`VirtualCameraControl`] handle, which also records
//! every call the session makes so the call order can be inspected.
//!
//! ```text
//!  VirtualCameraControl ──emit──▶ DeviceEventSink ──▶ session thread
//!          ▲                                               │
//!          └──────────── BackendCall log ◀── trait calls ──┘
//! ```

use crate::backends::camera::types::{
    AfMode, BackendError, BackendResult, CameraCharacteristics, CaptureResult, HardwareLevel,
    ImageFormat, ImageFrame, LensFacing, Rect, RequestTag, Size,
};
use crate::backends::camera::{
    CameraDevice, CameraProvider, CaptureSession, DeviceEvent, DeviceEventSink, ImageOutput,
    SessionOutput,
};
use crate::pipelines::photo::request::{CaptureRequestConfig, OutputTarget, RequestTemplate};
use image::codecs::jpeg::JpegEncoder;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Dimensions of the JPEG produced for still captures
const SYNTHETIC_JPEG_SIZE: (u32, u32) = (32, 24);

/// A camera exposed by the virtual provider
#[derive(Debug, Clone)]
pub struct VirtualCameraSpec {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

impl VirtualCameraSpec {
    /// Camera with typical phone sensor metadata
    pub fn new(id: &str, lens_facing: LensFacing) -> Self {
        let sensor_orientation = match lens_facing {
            LensFacing::Front => 270,
            LensFacing::Back | LensFacing::External => 90,
        };
        Self {
            id: id.to_string(),
            characteristics: CameraCharacteristics {
                lens_facing: Some(lens_facing),
                hardware_level: Some(HardwareLevel::Full),
                sensor_orientation: Some(sensor_orientation),
                active_array_size: Some(Rect::new(0, 0, 4000, 3000)),
                max_digital_zoom: Some(8.0),
                minimum_focus_distance: Some(10.0),
                af_available_modes: vec![AfMode::Off, AfMode::Auto, AfMode::ContinuousPicture],
                max_af_regions: 1,
                flash_available: Some(lens_facing != LensFacing::Front),
                preview_sizes: vec![
                    Size::new(640, 480),
                    Size::new(1280, 720),
                    Size::new(1280, 960),
                    Size::new(1440, 1080),
                    Size::new(1920, 1080),
                ],
                picture_sizes: vec![
                    Size::new(1280, 960),
                    Size::new(1920, 1080),
                    Size::new(3840, 2160),
                    Size::new(4000, 3000),
                ],
            },
        }
    }

    pub fn back(id: &str) -> Self {
        Self::new(id, LensFacing::Back)
    }

    pub fn front(id: &str) -> Self {
        Self::new(id, LensFacing::Front)
    }

    pub fn external(id: &str) -> Self {
        Self::new(id, LensFacing::External)
    }
}

/// A call made by the session into the virtual backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    OpenCamera(String),
    CreateImageOutput {
        target: OutputTarget,
        size: Size,
        format: ImageFormat,
    },
    CloseImageOutput(OutputTarget),
    CreateSession(Vec<SessionOutput>),
    SetRepeating(CaptureRequestConfig),
    Capture(CaptureRequestConfig),
    StopRepeating,
    CloseSession,
    CloseDevice,
}

#[derive(Default)]
struct VirtualState {
    calls: Vec<BackendCall>,
    sink: Option<DeviceEventSink>,
    open_error: Option<BackendError>,
    open_async_error: Option<String>,
    configure_failure: Option<String>,
    repeating_failures: usize,
    capture_failures: usize,
    manual_still: bool,
    initial_crop_region: Option<Rect>,
}

/// Test and scripting handle shared with the provider
#[derive(Clone, Default)]
pub struct VirtualCameraControl {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualCameraControl {
    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: BackendCall) {
        debug!(?call, "Virtual camera call");
        self.lock().calls.push(call);
    }

    /// Every call recorded so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Most recent repeating request
    pub fn last_repeating(&self) -> Option<CaptureRequestConfig> {
        self.calls().into_iter().rev().find_map(|call| match call {
            BackendCall::SetRepeating(request) => Some(request),
            _ => None,
        })
    }

    /// One-shot requests, oldest first
    pub fn captures(&self) -> Vec<CaptureRequestConfig> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Capture(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Reject the next `open_camera` call synchronously
    pub fn fail_open(&self, error: BackendError) {
        self.lock().open_error = Some(error);
    }

    /// Accept the next `open_camera` call but report a device error
    pub fn fail_open_async(&self, reason: &str) {
        self.lock().open_async_error = Some(reason.to_string());
    }

    /// Report the next session configuration as failed
    pub fn fail_session_configure(&self, reason: &str) {
        self.lock().configure_failure = Some(reason.to_string());
    }

    /// Fail the next `count` repeating requests
    pub fn fail_next_repeating(&self, count: usize) {
        self.lock().repeating_failures = count;
    }

    /// Fail the next `count` one-shot requests
    pub fn fail_next_capture(&self, count: usize) {
        self.lock().capture_failures = count;
    }

    /// Stop producing the JPEG and completion automatically for still captures
    pub fn set_manual_still(&self, manual: bool) {
        self.lock().manual_still = manual;
    }

    /// Crop region the preview template reports, defaults to the active array
    pub fn set_initial_crop_region(&self, rect: Rect) {
        self.lock().initial_crop_region = Some(rect);
    }

    /// Sink of the most recently opened device
    pub fn sink(&self) -> Option<DeviceEventSink> {
        self.lock().sink.clone()
    }

    /// Post an event as if the platform raised it
    pub fn emit(&self, event: DeviceEvent) {
        match self.sink() {
            Some(sink) => sink.post(event),
            None => warn!(?event, "Virtual camera has no open device, event dropped"),
        }
    }

    /// Deliver preview metadata
    pub fn emit_capture_result(&self, result: CaptureResult) {
        self.emit(DeviceEvent::CaptureCompleted(result));
    }

    /// Deliver a YUV scan frame (luma plane)
    pub fn emit_scan_frame(&self, width: u32, height: u32, luma: Vec<u8>) {
        self.emit(DeviceEvent::ImageAvailable(ImageFrame {
            format: ImageFormat::Yuv420,
            width,
            height,
            data: Arc::from(luma),
        }));
    }

    /// Deliver the JPEG and completion for a still capture
    pub fn complete_still(&self) {
        let (width, height) = SYNTHETIC_JPEG_SIZE;
        self.emit(DeviceEvent::ImageAvailable(ImageFrame {
            format: ImageFormat::Jpeg,
            width,
            height,
            data: Arc::from(synthetic_jpeg(width, height)),
        }));
        self.emit(DeviceEvent::CaptureCompleted(CaptureResult {
            tag: Some(RequestTag::StillCapture),
            ..Default::default()
        }));
    }

    pub fn disconnect(&self) {
        self.emit(DeviceEvent::Disconnected);
    }
}

/// Gradient test picture encoded as JPEG
pub fn synthetic_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut bytes = Vec::new();
    if let Err(e) = JpegEncoder::new_with_quality(&mut bytes, 90).encode_image(&pixels) {
        warn!(error = %e, "Failed to encode synthetic JPEG");
    }
    bytes
}

/// Camera provider serving [`VirtualCameraSpec`]s
pub struct VirtualCameraProvider {
    cameras: Vec<VirtualCameraSpec>,
    control: VirtualCameraControl,
}

impl VirtualCameraProvider {
    pub fn new(cameras: Vec<VirtualCameraSpec>) -> Self {
        Self {
            cameras,
            control: VirtualCameraControl::default(),
        }
    }

    /// Back and front camera, the usual phone layout
    pub fn phone() -> Self {
        Self::new(vec![
            VirtualCameraSpec::back("0"),
            VirtualCameraSpec::front("1"),
        ])
    }

    pub fn control(&self) -> VirtualCameraControl {
        self.control.clone()
    }

    fn spec(&self, camera_id: &str) -> BackendResult<&VirtualCameraSpec> {
        self.cameras
            .iter()
            .find(|spec| spec.id == camera_id)
            .ok_or_else(|| BackendError::DeviceNotFound(camera_id.to_string()))
    }
}

impl CameraProvider for VirtualCameraProvider {
    fn camera_ids(&self) -> BackendResult<Vec<String>> {
        Ok(self.cameras.iter().map(|spec| spec.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics> {
        Ok(self.spec(camera_id)?.characteristics.clone())
    }

    fn open_camera(&mut self, camera_id: &str, events: DeviceEventSink) -> BackendResult<()> {
        let active_array = self.spec(camera_id)?.characteristics.active_array_size;
        self.control.record(BackendCall::OpenCamera(camera_id.to_string()));

        let async_error = {
            let mut state = self.control.lock();
            if let Some(error) = state.open_error.take() {
                return Err(error);
            }
            state.sink = Some(events.clone());
            state.open_async_error.take()
        };

        match async_error {
            Some(reason) => events.post(DeviceEvent::Error(reason)),
            None => events.post(DeviceEvent::Opened(Box::new(VirtualDevice {
                id: camera_id.to_string(),
                active_array,
                control: self.control.clone(),
            }))),
        }
        Ok(())
    }

    fn create_image_output(
        &mut self,
        target: OutputTarget,
        size: Size,
        format: ImageFormat,
        _max_images: u32,
    ) -> BackendResult<Box<dyn ImageOutput>> {
        self.control.record(BackendCall::CreateImageOutput {
            target,
            size,
            format,
        });
        Ok(Box::new(VirtualImageOutput {
            target,
            size,
            format,
            control: self.control.clone(),
        }))
    }
}

struct VirtualDevice {
    id: String,
    active_array: Option<Rect>,
    control: VirtualCameraControl,
}

impl CameraDevice for VirtualDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> BackendResult<CaptureRequestConfig> {
        let mut request = CaptureRequestConfig::new(template);
        let initial = self.control.lock().initial_crop_region;
        request.crop_region = initial.or(self.active_array);
        Ok(request)
    }

    fn create_capture_session(
        &mut self,
        outputs: &[SessionOutput],
        events: DeviceEventSink,
    ) -> BackendResult<()> {
        self.control.record(BackendCall::CreateSession(outputs.to_vec()));
        let failure = self.control.lock().configure_failure.take();
        match failure {
            Some(reason) => events.post(DeviceEvent::SessionConfigureFailed(reason)),
            None => events.post(DeviceEvent::SessionConfigured(Box::new(VirtualSession {
                control: self.control.clone(),
            }))),
        }
        Ok(())
    }

    fn close(&mut self) {
        self.control.record(BackendCall::CloseDevice);
    }
}

struct VirtualSession {
    control: VirtualCameraControl,
}

impl CaptureSession for VirtualSession {
    fn set_repeating_request(&mut self, request: &CaptureRequestConfig) -> BackendResult<()> {
        {
            let mut state = self.control.lock();
            if state.repeating_failures > 0 {
                state.repeating_failures -= 1;
                return Err(BackendError::RequestFailed("repeating request rejected".into()));
            }
        }
        self.control.record(BackendCall::SetRepeating(request.clone()));
        Ok(())
    }

    fn capture(&mut self, request: &CaptureRequestConfig) -> BackendResult<()> {
        let manual_still = {
            let mut state = self.control.lock();
            if state.capture_failures > 0 {
                state.capture_failures -= 1;
                return Err(BackendError::RequestFailed("capture rejected".into()));
            }
            state.manual_still
        };
        self.control.record(BackendCall::Capture(request.clone()));

        match request.tag {
            Some(RequestTag::StillCapture) if !manual_still => self.control.complete_still(),
            Some(tag @ (RequestTag::FocusArea | RequestTag::UnlockFocus)) => {
                self.control.emit(DeviceEvent::CaptureCompleted(CaptureResult {
                    tag: Some(tag),
                    ..Default::default()
                }));
            }
            _ => {}
        }
        Ok(())
    }

    fn stop_repeating(&mut self) -> BackendResult<()> {
        self.control.record(BackendCall::StopRepeating);
        Ok(())
    }

    fn close(&mut self) {
        self.control.record(BackendCall::CloseSession);
    }
}

struct VirtualImageOutput {
    target: OutputTarget,
    size: Size,
    format: ImageFormat,
    control: VirtualCameraControl,
}

impl ImageOutput for VirtualImageOutput {
    fn target(&self) -> OutputTarget {
        self.target
    }

    fn size(&self) -> Size {
        self.size
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn close(&mut self) {
        self.control.record(BackendCall::CloseImageOutput(self.target));
    }
}
