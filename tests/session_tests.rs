// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests of the camera session over the virtual camera

use camera_bridge::app::frame_processor::{
    Detection, DetectorKind, FaceDetection, FaceDetectionMode, FaceDetectorSettings, FrameRegion,
    ScanFrame, ScanningFlags, VisionDetector,
};
use camera_bridge::backends::camera::types::{
    AeState, AfMode, AfState, AfTrigger, AePrecaptureTrigger, AspectRatio, BackendError,
    CaptureResult, Facing, ImageFormat, Rect, RequestTag, Size,
};
use camera_bridge::backends::virtual_camera::{
    BackendCall, VirtualCameraControl, VirtualCameraProvider,
};
use camera_bridge::pipelines::photo::{OutputTarget, request::focus_area};
use camera_bridge::{
    CameraEvent, CameraSession, CaptureState, Config, EventReceiver, Flash, PhotoError,
    PictureOptions, WhiteBalance,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

const SURFACE: Size = Size::new(1080, 1920);
const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    // Dropped before the runtime so the session thread is joined first
    session: CameraSession,
    events: EventReceiver,
    control: VirtualCameraControl,
    runtime: Runtime,
}

fn harness_with(config: Config, detectors: Vec<Arc<dyn VisionDetector>>) -> Harness {
    let runtime = Runtime::new().unwrap();
    let provider = VirtualCameraProvider::phone();
    let control = provider.control();
    let mut builder = CameraSession::builder(Box::new(provider))
        .config(config)
        .runtime(runtime.handle().clone());
    for detector in detectors {
        builder = builder.detector(detector);
    }
    let (session, events) = builder.spawn().unwrap();
    Harness {
        session,
        events,
        control,
        runtime,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), Vec::new())
}

/// Session with a configured, running preview
fn started(config: Config) -> Harness {
    let mut h = harness_with(config, Vec::new());
    h.start();
    h
}

fn picture() -> PictureOptions {
    PictureOptions {
        do_not_save: true,
        ..Default::default()
    }
}

impl Harness {
    fn start(&mut self) {
        self.session.set_preview_surface(SURFACE);
        self.session.start();
        self.wait_until(|h| h.session.is_preview_running().unwrap());
        assert_eq!(self.next_event(), Some(CameraEvent::CameraOpened));
    }

    fn next_event(&mut self) -> Option<CameraEvent> {
        let events = &mut self.events;
        self.runtime
            .block_on(async move { tokio::time::timeout(TIMEOUT, events.recv()).await })
            .ok()
            .flatten()
    }

    /// Skip events until one matches
    fn wait_event(&mut self, matches: impl Fn(&CameraEvent) -> bool) -> CameraEvent {
        loop {
            match self.next_event() {
                Some(event) if matches(&event) => return event,
                Some(_) => continue,
                None => panic!("timed out waiting for event"),
            }
        }
    }

    /// Events already queued, after every posted command has run
    fn drain_events(&mut self) -> Vec<CameraEvent> {
        self.session.capture_state().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn wait_until(&self, condition: impl Fn(&Harness) -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !condition(self) {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn captures_tagged(&self, tag: RequestTag) -> usize {
        self.control
            .captures()
            .iter()
            .filter(|request| request.tag == Some(tag))
            .count()
    }

    /// Capture sessions created and closed so far
    fn session_counts(&self) -> (usize, usize) {
        let calls = self.control.calls();
        let created = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::CreateSession(_)))
            .count();
        let closed = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::CloseSession))
            .count();
        (created, closed)
    }

    fn emit_3a(&self, af: AfState, ae: AeState) {
        self.control
            .emit_capture_result(CaptureResult::preview(Some(af), Some(ae)));
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_start_opens_camera_and_starts_preview() {
    let h = started(Config::default());

    assert!(h.session.is_camera_opened().unwrap());
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Preview);

    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.tag, Some(RequestTag::Preview));
    assert_eq!(repeating.af_mode, AfMode::ContinuousPicture);
    assert_eq!(repeating.targets, vec![OutputTarget::Preview]);

    // 4:3 preview sizes stop at 1440x1080, none covers the surface
    assert_eq!(h.session.preview_size().unwrap(), Some(Size::new(1440, 1080)));

    let calls = h.control.calls();
    assert!(calls.contains(&BackendCall::OpenCamera("0".into())));
    assert!(calls.contains(&BackendCall::CreateImageOutput {
        target: OutputTarget::StillImage,
        size: Size::new(4000, 3000),
        format: ImageFormat::Jpeg,
    }));
    assert!(calls.contains(&BackendCall::CreateImageOutput {
        target: OutputTarget::ScanImage,
        size: Size::new(1440, 1080),
        format: ImageFormat::Yuv420,
    }));
}

#[test]
fn test_capture_session_waits_for_preview_surface() {
    let mut h = harness();
    h.session.start();
    assert_eq!(h.next_event(), Some(CameraEvent::CameraOpened));
    assert!(h.session.is_camera_opened().unwrap());
    assert!(!h.session.is_preview_running().unwrap());
    assert!(
        !h.control
            .calls()
            .iter()
            .any(|call| matches!(call, BackendCall::CreateSession(_)))
    );

    h.session.set_preview_surface(SURFACE);
    h.wait_until(|h| h.session.is_preview_running().unwrap());
}

#[test]
fn test_stop_releases_in_order_and_is_idempotent() {
    let mut h = started(Config::default());
    h.control.clear_calls();

    h.session.stop();
    h.session.stop();
    let events = h.drain_events();
    assert_eq!(events, vec![CameraEvent::CameraClosed]);

    assert_eq!(
        h.control.calls(),
        vec![
            BackendCall::CloseSession,
            BackendCall::CloseDevice,
            BackendCall::CloseImageOutput(OutputTarget::StillImage),
            BackendCall::CloseImageOutput(OutputTarget::ScanImage),
        ]
    );
    assert!(!h.session.is_camera_opened().unwrap());
}

#[test]
fn test_events_from_stopped_session_are_ignored() {
    let mut h = started(Config::default());
    h.session.stop();
    h.drain_events();

    // The platform still holds the old sink and keeps calling back
    h.control.complete_still();
    h.emit_3a(AfState::FocusedLocked, AeState::Converged);
    h.control.disconnect();

    assert!(h.drain_events().is_empty());
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Preview);
}

#[test]
fn test_superseded_capture_session_is_closed() {
    let mut h = harness();
    h.session.start();
    assert_eq!(h.next_event(), Some(CameraEvent::CameraOpened));

    // Second surface arrives before the first session finishes configuring
    h.session.set_preview_surface(SURFACE);
    h.session.set_preview_surface(Size::new(720, 1280));
    h.wait_until(|h| h.session_counts().0 == 2 && h.session.is_preview_running().unwrap());
    let (created, closed) = h.session_counts();
    assert_eq!(created, 2);
    assert_eq!(closed, 1);

    h.session.stop();
    h.drain_events();
    let (created, closed) = h.session_counts();
    assert_eq!(created, closed, "every created session must be closed");
}

#[test]
fn test_reconfigure_during_session_configure_closes_pending_session() {
    let mut h = harness();
    h.session.start();
    assert_eq!(h.next_event(), Some(CameraEvent::CameraOpened));

    let wide = AspectRatio::new(16, 9).unwrap();
    h.session.set_preview_surface(SURFACE);
    h.session.set_aspect_ratio(wide);
    h.wait_until(|h| h.session_counts().0 == 2 && h.session.is_preview_running().unwrap());

    // Preview runs on the session built for the new ratio
    assert_eq!(h.session.preview_size().unwrap(), Some(Size::new(1920, 1080)));
    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.tag, Some(RequestTag::Preview));

    h.session.stop();
    h.drain_events();
    let (created, closed) = h.session_counts();
    assert_eq!(created, 2);
    assert_eq!(created, closed);
}

#[test]
fn test_session_configured_after_stop_is_closed() {
    let mut h = harness();
    h.session.start();
    assert_eq!(h.next_event(), Some(CameraEvent::CameraOpened));

    // Stop may run before the configure callback arrives
    h.session.set_preview_surface(SURFACE);
    h.session.stop();
    h.wait_until(|h| h.session_counts() == (1, 1));
    assert!(!h.session.is_preview_running().unwrap());
}

#[test]
fn test_restart_after_stop() {
    let mut h = started(Config::default());
    h.session.stop();
    assert_eq!(h.next_event(), Some(CameraEvent::CameraClosed));
    h.start();
    assert!(h.session.is_camera_opened().unwrap());
}

#[test]
fn test_set_facing_restarts_on_other_camera() {
    let mut h = started(Config::default());
    h.session.set_facing(Facing::Front);
    h.wait_event(|event| *event == CameraEvent::CameraClosed);
    h.wait_event(|event| *event == CameraEvent::CameraOpened);

    assert_eq!(h.session.settings().unwrap().facing, Facing::Front);
    assert!(
        h.control
            .calls()
            .contains(&BackendCall::OpenCamera("1".into()))
    );
}

// =============================================================================
// Mount errors
// =============================================================================

#[test]
fn test_open_rejected_reports_mount_error() {
    let mut h = harness();
    h.control
        .fail_open(BackendError::AccessDenied("camera in use".into()));
    h.session.set_preview_surface(SURFACE);
    h.session.start();

    match h.next_event() {
        Some(CameraEvent::MountError { message }) => assert!(message.contains("camera in use")),
        other => panic!("expected mount error, got {:?}", other),
    }
    assert!(!h.session.is_camera_opened().unwrap());
    // Outputs created before the open are released again
    let calls = h.control.calls();
    assert!(calls.contains(&BackendCall::CloseImageOutput(OutputTarget::StillImage)));
    assert!(calls.contains(&BackendCall::CloseImageOutput(OutputTarget::ScanImage)));
}

#[test]
fn test_async_open_error_reports_mount_error() {
    let mut h = harness();
    h.control.fail_open_async("permission denied");
    h.session.set_preview_surface(SURFACE);
    h.session.start();

    let event = h.wait_event(|event| matches!(event, CameraEvent::MountError { .. }));
    assert!(matches!(event, CameraEvent::MountError { message } if message.contains("permission denied")));
}

#[test]
fn test_session_configure_failure_reports_mount_error() {
    let mut h = harness();
    h.control.fail_session_configure("stream combination unsupported");
    h.session.set_preview_surface(SURFACE);
    h.session.start();

    h.wait_event(|event| matches!(event, CameraEvent::MountError { .. }));
    assert!(!h.session.is_preview_running().unwrap());
}

#[test]
fn test_disconnect_reports_mount_error_once() {
    let mut h = started(Config::default());
    h.control.disconnect();
    h.control.emit(camera_bridge::backends::camera::DeviceEvent::Error(
        "fatal".into(),
    ));

    let mount_errors = h
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, CameraEvent::MountError { .. }))
        .count();
    assert_eq!(mount_errors, 1);
    assert!(!h.session.is_camera_opened().unwrap());
}

// =============================================================================
// Still capture
// =============================================================================

#[test]
fn test_take_picture_runs_precapture_sequence() {
    let mut h = started(Config::default());
    h.session.take_picture(picture());
    h.emit_3a(AfState::FocusedLocked, AeState::Searching);
    h.emit_3a(AfState::FocusedLocked, AeState::Precapture);
    h.emit_3a(AfState::FocusedLocked, AeState::Converged);

    let taken = h.wait_event(|event| matches!(event, CameraEvent::PictureTaken { .. }));
    let CameraEvent::PictureTaken {
        device_orientation,
        software_rotation,
        ..
    } = taken
    else {
        unreachable!()
    };
    assert_eq!((device_orientation, software_rotation), (0, 0));
    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));

    let captures = h.control.captures();
    let lock = captures
        .iter()
        .find(|request| request.tag == Some(RequestTag::LockFocus))
        .unwrap();
    assert_eq!(lock.af_trigger, Some(AfTrigger::Start));
    let precapture = captures
        .iter()
        .find(|request| request.tag == Some(RequestTag::Precapture))
        .unwrap();
    assert_eq!(
        precapture.ae_precapture_trigger,
        Some(AePrecaptureTrigger::Start)
    );
    let still = captures
        .iter()
        .find(|request| request.tag == Some(RequestTag::StillCapture))
        .unwrap();
    assert_eq!(still.targets, vec![OutputTarget::StillImage]);
    assert_eq!(still.jpeg_orientation, Some(90));

    h.wait_until(|h| h.session.capture_state().unwrap() == CaptureState::Preview);
    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.af_trigger, Some(AfTrigger::Idle));
    assert_eq!(repeating.tag, Some(RequestTag::Preview));
}

#[test]
fn test_converged_exposure_skips_precapture() {
    let mut h = started(Config::default());
    h.session.take_picture(picture());
    h.emit_3a(AfState::NotFocusedLocked, AeState::Converged);

    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));
    assert_eq!(h.captures_tagged(RequestTag::Precapture), 0);
    assert_eq!(h.captures_tagged(RequestTag::StillCapture), 1);
}

#[test]
fn test_results_before_focus_locks_are_ignored() {
    let h = started(Config::default());
    h.session.take_picture(picture());
    h.emit_3a(AfState::ActiveScan, AeState::Converged);
    h.emit_3a(AfState::PassiveFocused, AeState::Converged);

    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Locking);
    assert_eq!(h.captures_tagged(RequestTag::StillCapture), 0);
}

#[test]
fn test_take_picture_without_autofocus_captures_immediately() {
    let mut h = started(Config::default());
    h.session.set_auto_focus(false);
    h.session.take_picture(picture());

    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));
    assert_eq!(h.captures_tagged(RequestTag::LockFocus), 0);
    assert_eq!(h.captures_tagged(RequestTag::StillCapture), 1);
}

#[test]
fn test_take_picture_while_busy_is_rejected() {
    let mut h = started(Config::default());
    h.session.take_picture(picture());
    h.session.take_picture(picture());

    let failed = h.wait_event(|event| matches!(event, CameraEvent::PictureFailed { .. }));
    assert_eq!(
        failed,
        CameraEvent::PictureFailed {
            message: PhotoError::CaptureInProgress.to_string()
        }
    );
    assert_eq!(h.captures_tagged(RequestTag::LockFocus), 1);

    h.emit_3a(AfState::FocusedLocked, AeState::Converged);
    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));
}

#[test]
fn test_take_picture_before_start_fails() {
    let mut h = harness();
    h.session.take_picture(picture());
    assert_eq!(
        h.next_event(),
        Some(CameraEvent::PictureFailed {
            message: PhotoError::NotReady.to_string()
        })
    );
}

#[test]
fn test_rejected_still_capture_reports_failure() {
    let mut h = started(Config::default());
    h.session.set_auto_focus(false);
    h.control.fail_next_capture(1);
    h.session.take_picture(picture());

    h.wait_event(|event| matches!(event, CameraEvent::PictureFailed { .. }));
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Capturing);

    h.session.resume_preview();
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Preview);
    h.session.take_picture(picture());
    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));
}

#[test]
fn test_pause_after_capture_keeps_preview_stopped() {
    let mut h = started(Config::default());
    h.session.set_auto_focus(false);
    h.session.take_picture(PictureOptions {
        pause_after_capture: true,
        ..picture()
    });
    h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }));
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Capturing);

    let calls = h.control.calls();
    let still = calls
        .iter()
        .rposition(|call| matches!(call, BackendCall::Capture(request) if request.tag == Some(RequestTag::StillCapture)))
        .unwrap();
    assert!(
        !calls[still..]
            .iter()
            .any(|call| matches!(call, BackendCall::SetRepeating(_)))
    );
    assert_eq!(calls.last(), Some(&BackendCall::StopRepeating));

    h.session.resume_preview();
    assert_eq!(h.session.capture_state().unwrap(), CaptureState::Preview);
    assert!(matches!(
        h.control.calls().last(),
        Some(BackendCall::SetRepeating(_))
    ));
}

#[test]
fn test_stop_fails_pending_picture() {
    let mut h = started(Config::default());
    h.control.set_manual_still(true);
    h.session.set_auto_focus(false);
    h.session.take_picture(picture());
    h.session.stop();

    let events = h.drain_events();
    assert!(events.iter().any(|event| matches!(event, CameraEvent::PictureFailed { .. })));
    assert_eq!(events.last(), Some(&CameraEvent::CameraClosed));
}

#[test]
fn test_picture_saved_to_directory() {
    let directory = std::env::temp_dir().join(format!("camera-bridge-{}", uuid::Uuid::new_v4()));
    let config = Config {
        photo_directory: Some(directory.clone()),
        auto_focus: false,
        ..Default::default()
    };
    let mut h = started(config);
    h.session.take_picture(PictureOptions {
        exif: true,
        ..Default::default()
    });

    let CameraEvent::PictureSaved { picture } =
        h.wait_event(|event| matches!(event, CameraEvent::PictureSaved { .. }))
    else {
        unreachable!()
    };
    let uri = picture.uri.unwrap();
    let path = uri.strip_prefix("file://").unwrap();
    assert!(std::path::Path::new(path).starts_with(&directory));
    assert!(std::path::Path::new(path).exists());
    assert!(picture.exif.is_some());

    let _ = std::fs::remove_dir_all(&directory);
}

// =============================================================================
// Settings
// =============================================================================

#[test]
fn test_failed_setter_rolls_back() {
    let h = started(Config::default());
    let before = h.control.last_repeating().unwrap();

    h.control.fail_next_repeating(1);
    h.session.set_zoom(0.5);
    assert_eq!(h.session.settings().unwrap().zoom, 0.0);
    assert_eq!(h.control.last_repeating().unwrap(), before);

    // The rolled back request is what the next change starts from
    h.session.set_flash(Flash::Torch);
    let after = h.control.last_repeating().unwrap();
    assert_eq!(after.crop_region, before.crop_region);
    assert_eq!(h.session.settings().unwrap().flash, Flash::Torch);

    h.session.set_zoom(0.5);
    assert_eq!(h.session.settings().unwrap().zoom, 0.5);
    assert_ne!(h.control.last_repeating().unwrap().crop_region, before.crop_region);
}

#[test]
fn test_failed_flash_rolls_back() {
    let h = started(Config::default());
    let before = h.control.last_repeating().unwrap();

    h.control.fail_next_repeating(1);
    h.session.set_flash(Flash::On);
    assert_eq!(h.session.settings().unwrap().flash, Flash::Off);
    assert_eq!(h.control.last_repeating().unwrap(), before);

    h.session.set_flash_raw(1);
    assert_eq!(h.session.settings().unwrap().flash, Flash::On);
}

#[test]
fn test_failed_white_balance_rolls_back() {
    let h = started(Config::default());
    let before = h.control.last_repeating().unwrap();

    h.control.fail_next_repeating(1);
    h.session.set_white_balance(WhiteBalance::Cloudy);
    assert_eq!(h.session.settings().unwrap().white_balance, WhiteBalance::Auto);
    assert_eq!(h.control.last_repeating().unwrap(), before);

    h.session.set_white_balance(WhiteBalance::Cloudy);
    assert_eq!(h.session.settings().unwrap().white_balance, WhiteBalance::Cloudy);
    assert_ne!(h.control.last_repeating().unwrap(), before);
}

#[test]
fn test_failed_focus_depth_rolls_back() {
    let config = Config {
        auto_focus: false,
        ..Default::default()
    };
    let h = started(config);
    let before = h.control.last_repeating().unwrap();
    assert_eq!(before.af_mode, AfMode::Off);

    h.control.fail_next_repeating(1);
    h.session.set_focus_depth(0.25);
    assert_eq!(h.session.settings().unwrap().focus_depth, 0.0);
    assert_eq!(h.control.last_repeating().unwrap(), before);

    h.session.set_focus_depth(0.25);
    assert_eq!(h.session.settings().unwrap().focus_depth, 0.25);
    assert_eq!(h.control.last_repeating().unwrap().lens_focus_distance, Some(2.5));
}

#[test]
fn test_zoom_zero_restores_initial_crop_region() {
    let mut h = harness();
    let initial = Rect::new(2, 1, 3998, 2999);
    h.control.set_initial_crop_region(initial);
    h.start();

    h.session.set_zoom(1.0);
    assert_eq!(
        h.control.last_repeating().unwrap().crop_region,
        Some(Rect::new(1750, 1312, 2250, 1688))
    );
    h.session.set_zoom(0.0);
    assert_eq!(h.control.last_repeating().unwrap().crop_region, Some(initial));
}

#[test]
fn test_raw_values_outside_table_are_ignored() {
    let h = started(Config::default());
    h.session.set_flash_raw(3);
    h.session.set_flash_raw(42);
    h.session.set_white_balance_raw(4);
    h.session.set_white_balance_raw(-1);

    let settings = h.session.settings().unwrap();
    assert_eq!(settings.flash, Flash::Auto);
    assert_eq!(
        settings.white_balance,
        camera_bridge::WhiteBalance::Fluorescent
    );
}

#[test]
fn test_settings_before_start_apply_on_configure() {
    let mut h = harness();
    h.session.set_flash(Flash::On);
    h.session.set_zoom(2.0);
    h.start();

    assert_eq!(h.session.settings().unwrap().zoom, 1.0);
    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.zoom_factor, 1.0);
    assert_eq!(
        repeating.ae_mode,
        camera_bridge::backends::camera::types::AeMode::OnAlwaysFlash
    );
}

#[test]
fn test_manual_focus_depth() {
    let h = started(Config::default());
    h.session.set_auto_focus(false);
    h.session.set_focus_depth(0.25);

    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.af_mode, AfMode::Off);
    assert_eq!(repeating.lens_focus_distance, Some(2.5));
}

#[test]
fn test_device_orientation_is_normalized() {
    let h = harness();
    h.session.set_device_orientation(-90);
    assert_eq!(h.session.settings().unwrap().device_orientation, 270);
    h.session.set_device_orientation(45);
    assert_eq!(h.session.settings().unwrap().device_orientation, 270);
}

#[test]
fn test_focus_area_restores_repeating_request() {
    let h = started(Config::default());
    h.session.set_focus_area(0.5, 0.5);

    h.wait_until(|h| {
        h.control
            .last_repeating()
            .is_some_and(|request| request.af_trigger == Some(AfTrigger::Idle))
    });

    let captures = h.control.captures();
    let cancel = captures
        .iter()
        .find(|request| request.tag == Some(RequestTag::UnlockFocus))
        .unwrap();
    assert_eq!(cancel.af_trigger, Some(AfTrigger::Cancel));
    assert_eq!(cancel.af_mode, AfMode::Off);

    let trigger = captures
        .iter()
        .find(|request| request.tag == Some(RequestTag::FocusArea))
        .unwrap();
    assert_eq!(trigger.af_trigger, Some(AfTrigger::Start));
    assert_eq!(trigger.af_mode, AfMode::Auto);
    assert_eq!(
        trigger.af_regions,
        vec![focus_area(0.5, 0.5, Rect::new(0, 0, 4000, 3000))]
    );

    let repeating = h.control.last_repeating().unwrap();
    assert_eq!(repeating.af_mode, AfMode::Auto);
    assert_eq!(repeating.tag, Some(RequestTag::Preview));
}

// =============================================================================
// Reconfiguration
// =============================================================================

#[test]
fn test_aspect_ratio_change_rebuilds_outputs() {
    let h = started(Config::default());
    let wide = AspectRatio::new(16, 9).unwrap();
    assert!(h.session.supported_aspect_ratios().unwrap().contains(&wide));
    h.control.clear_calls();

    h.session.set_aspect_ratio(wide);
    h.wait_until(|h| h.session.is_preview_running().unwrap());

    let calls = h.control.calls();
    assert_eq!(calls[0], BackendCall::StopRepeating);
    assert_eq!(calls[1], BackendCall::CloseSession);
    assert!(calls.contains(&BackendCall::CreateImageOutput {
        target: OutputTarget::StillImage,
        size: Size::new(3840, 2160),
        format: ImageFormat::Jpeg,
    }));
    assert_eq!(h.session.preview_size().unwrap(), Some(Size::new(1920, 1080)));
    assert_eq!(h.session.settings().unwrap().aspect_ratio, wide);
    assert_eq!(
        h.session.available_picture_sizes(wide).unwrap(),
        vec![Size::new(1920, 1080), Size::new(3840, 2160)]
    );
}

#[test]
fn test_unsupported_aspect_ratio_is_ignored() {
    let h = started(Config::default());
    h.control.clear_calls();
    h.session.set_aspect_ratio(AspectRatio::new(1, 1).unwrap());

    assert_eq!(
        h.session.settings().unwrap().aspect_ratio,
        AspectRatio::new(4, 3).unwrap()
    );
    assert!(h.control.calls().is_empty());
}

#[test]
fn test_picture_size_must_match_aspect_ratio() {
    let h = started(Config::default());
    h.session.set_picture_size(Some(Size::new(1920, 1080)));
    assert_eq!(h.session.settings().unwrap().picture_size, None);

    h.session.set_picture_size(Some(Size::new(1280, 960)));
    h.wait_until(|h| h.session.is_preview_running().unwrap());
    assert!(h.control.calls().contains(&BackendCall::CreateImageOutput {
        target: OutputTarget::StillImage,
        size: Size::new(1280, 960),
        format: ImageFormat::Jpeg,
    }));
}

// =============================================================================
// Frame dispatch
// =============================================================================

struct OneFace;

impl VisionDetector for OneFace {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Face
    }

    fn detect<'a>(&'a self, _frame: &'a ScanFrame) -> Box<dyn Iterator<Item = Detection> + 'a> {
        Box::new(std::iter::once(Detection::Face(FaceDetection {
            bounds: FrameRegion::default(),
            roll_angle: Some(0.0),
            yaw_angle: None,
            smiling_probability: None,
        })))
    }
}

#[test]
fn test_scan_frames_reach_enabled_detectors() {
    let config = Config {
        scanning: ScanningFlags {
            faces: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut h = harness_with(config, vec![Arc::new(OneFace)]);
    h.start();
    assert!(
        h.control
            .last_repeating()
            .unwrap()
            .targets
            .contains(&OutputTarget::ScanImage)
    );

    h.control.emit_scan_frame(64, 48, vec![0; 64 * 48]);
    match h.next_event() {
        Some(CameraEvent::FramePreview {
            width,
            height,
            orientation,
            ..
        }) => assert_eq!((width, height, orientation), (64, 48, 90)),
        other => panic!("expected frame preview, got {:?}", other),
    }
    match h.wait_event(|event| matches!(event, CameraEvent::FacesDetected { .. })) {
        CameraEvent::FacesDetected { faces } => assert_eq!(faces.len(), 1),
        _ => unreachable!(),
    }
}

/// Face detector recording the options it receives
#[derive(Default)]
struct RecordingFaceDetector {
    settings: Mutex<Vec<FaceDetectorSettings>>,
}

impl VisionDetector for RecordingFaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Face
    }

    fn detect<'a>(&'a self, _frame: &'a ScanFrame) -> Box<dyn Iterator<Item = Detection> + 'a> {
        Box::new(std::iter::empty())
    }

    fn configure(&self, settings: &FaceDetectorSettings) {
        self.settings.lock().unwrap().push(*settings);
    }
}

#[test]
fn test_face_detector_settings_reach_detector() {
    let configured = FaceDetectorSettings {
        mode: FaceDetectionMode::Accurate,
        ..Default::default()
    };
    let config = Config {
        face_detection: configured,
        ..Default::default()
    };
    let detector = Arc::new(RecordingFaceDetector::default());
    let h = harness_with(config, vec![detector.clone() as Arc<dyn VisionDetector>]);
    assert_eq!(h.session.settings().unwrap().face_detection, configured);

    let tracking = FaceDetectorSettings {
        landmarks: true,
        classifications: true,
        tracking: true,
        ..configured
    };
    h.session.set_face_detector_settings(tracking);
    assert_eq!(h.session.settings().unwrap().face_detection, tracking);
    assert_eq!(*detector.settings.lock().unwrap(), vec![configured, tracking]);
}

#[test]
fn test_toggling_scanning_reconfigures_session() {
    let h = started(Config::default());
    assert_eq!(
        h.control.last_repeating().unwrap().targets,
        vec![OutputTarget::Preview]
    );

    h.session.set_scanning(ScanningFlags {
        barcodes: true,
        ..Default::default()
    });
    h.wait_until(|h| h.session.is_preview_running().unwrap());
    assert_eq!(
        h.control.last_repeating().unwrap().targets,
        vec![OutputTarget::Preview, OutputTarget::ScanImage]
    );
}

#[test]
fn test_camera_ids() {
    let h = harness();
    let cameras = h.session.camera_ids().unwrap();
    let ids: Vec<&str> = cameras.iter().map(|camera| camera.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1"]);
    assert!(cameras[0].flash);
    assert!(!cameras[1].flash);
}

#[test]
fn test_has_flash_follows_started_camera() {
    let mut h = harness();
    // Before start any camera with a flash counts
    assert!(h.session.has_flash().unwrap());

    h.start();
    assert!(h.session.has_flash().unwrap());

    h.session.set_facing(Facing::Front);
    h.wait_until(|h| h.session.settings().unwrap().facing == Facing::Front);
    assert!(!h.session.has_flash().unwrap());
}
