// SPDX-License-Identifier: GPL-3.0-only

//! Detector dispatch for scan frames
//!
//! Each detector kind has a busy flag. A frame is handed to a detector only
//! when its flag can be taken; otherwise the frame is dropped for that
//! detector. Frames are never queued, so a slow detector only ever sees the
//! most recent frame available when it becomes free.
//!
//! ```text
//! scan frame ──▶ FrameDispatcher ──flag free──▶ spawn_blocking(detect) ──▶ CameraEvent
//!                      │
//!                      └──flag held──▶ dropped (counted)
//! ```

use super::types::{BarcodeDetection, Detection, FaceDetection, FaceDetectorSettings, TextBlock};
use crate::app::events::{CameraEvent, EventSender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Kind of vision detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Barcode,
    Face,
    Text,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 3] = [DetectorKind::Barcode, DetectorKind::Face, DetectorKind::Text];
}

/// Which detector kinds are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanningFlags {
    pub barcodes: bool,
    pub faces: bool,
    pub text: bool,
}

impl ScanningFlags {
    /// Scan frames are only produced while some detector wants them
    pub fn any(&self) -> bool {
        self.barcodes || self.faces || self.text
    }

    pub fn enables(&self, kind: DetectorKind) -> bool {
        match kind {
            DetectorKind::Barcode => self.barcodes,
            DetectorKind::Face => self.faces,
            DetectorKind::Text => self.text,
        }
    }

    pub fn set(&mut self, kind: DetectorKind, enabled: bool) {
        match kind {
            DetectorKind::Barcode => self.barcodes = enabled,
            DetectorKind::Face => self.faces = enabled,
            DetectorKind::Text => self.text = enabled,
        }
    }
}

/// Luma plane of a scan frame plus the rotation detectors should assume
#[derive(Debug, Clone)]
pub struct ScanFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation to bring the frame upright
    pub rotation: i32,
}

/// A vision detector run on scan frames
///
/// `detect` runs on the blocking pool. The returned iterator may do its
/// work lazily; it is drained once and never restarted.
pub trait VisionDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn detect<'a>(&'a self, frame: &'a ScanFrame) -> Box<dyn Iterator<Item = Detection> + 'a>;

    /// Face detector options, passed on registration and on every change
    ///
    /// Called from the session thread, possibly while a detection runs.
    fn configure(&self, _settings: &FaceDetectorSettings) {}
}

/// Releases a busy flag when dropped, including on detector panic
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct DetectorSlot {
    detector: Arc<dyn VisionDetector>,
    busy: Arc<AtomicBool>,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Hands scan frames to detectors, at most one in flight per kind
pub struct FrameDispatcher {
    runtime: Handle,
    events: EventSender,
    slots: Vec<DetectorSlot>,
    face_settings: FaceDetectorSettings,
}

impl FrameDispatcher {
    pub fn new(runtime: Handle, events: EventSender) -> Self {
        Self {
            runtime,
            events,
            slots: Vec::new(),
            face_settings: FaceDetectorSettings::default(),
        }
    }

    /// Register a detector; a later detector of the same kind replaces the earlier one
    pub fn register(&mut self, detector: Arc<dyn VisionDetector>) {
        let kind = detector.kind();
        self.slots.retain(|slot| slot.detector.kind() != kind);
        debug!(?kind, "Registered detector");
        detector.configure(&self.face_settings);
        self.slots.push(DetectorSlot {
            detector,
            busy: Arc::new(AtomicBool::new(false)),
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });
    }

    /// Store face detector options and pass them to every detector
    pub fn configure(&mut self, settings: FaceDetectorSettings) {
        if self.face_settings == settings {
            return;
        }
        debug!(?settings, "Face detector settings changed");
        self.face_settings = settings;
        for slot in &self.slots {
            slot.detector.configure(&settings);
        }
    }

    pub fn face_settings(&self) -> FaceDetectorSettings {
        self.face_settings
    }

    pub fn has_detector(&self, kind: DetectorKind) -> bool {
        self.slot(kind).is_some()
    }

    fn slot(&self, kind: DetectorKind) -> Option<&DetectorSlot> {
        self.slots.iter().find(|slot| slot.detector.kind() == kind)
    }

    /// Dispatch a frame to every enabled detector whose flag is free
    ///
    /// Returns how many detectors received the frame.
    pub fn dispatch(&self, frame: ScanFrame, flags: ScanningFlags) -> usize {
        let frame = Arc::new(frame);
        let mut started = 0;

        for slot in &self.slots {
            let kind = slot.detector.kind();
            if !flags.enables(kind) {
                continue;
            }

            if slot
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                let dropped = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(?kind, dropped, "Detector busy, frame dropped");
                continue;
            }

            let guard = BusyGuard(Arc::clone(&slot.busy));
            let detector = Arc::clone(&slot.detector);
            let frame = Arc::clone(&frame);
            let events = self.events.clone();
            slot.dispatched.fetch_add(1, Ordering::Relaxed);
            started += 1;

            self.runtime.spawn_blocking(move || {
                let _guard = guard;
                let detections: Vec<Detection> = detector.detect(&frame).collect();
                trace!(?kind, count = detections.len(), "Detection finished");
                if let Some(event) = detection_event(kind, detections) {
                    if events.send(event).is_err() {
                        warn!(?kind, "Event receiver dropped, detections discarded");
                    }
                }
            });
        }

        started
    }

    /// Whether a detection of this kind is in flight
    pub fn is_busy(&self, kind: DetectorKind) -> bool {
        self.slot(kind)
            .map(|slot| slot.busy.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Frames handed to the detector of this kind
    pub fn dispatched(&self, kind: DetectorKind) -> u64 {
        self.slot(kind)
            .map(|slot| slot.dispatched.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Frames dropped because the detector of this kind was busy
    pub fn dropped(&self, kind: DetectorKind) -> u64 {
        self.slot(kind)
            .map(|slot| slot.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// Wrap a detector's results in the event for its kind
///
/// Faces are always reported so overlays can be cleared; barcodes and text
/// only when something was found.
fn detection_event(kind: DetectorKind, detections: Vec<Detection>) -> Option<CameraEvent> {
    match kind {
        DetectorKind::Barcode => {
            let barcodes: Vec<BarcodeDetection> = detections
                .into_iter()
                .filter_map(|d| match d {
                    Detection::Barcode(barcode) => Some(barcode),
                    _ => None,
                })
                .collect();
            (!barcodes.is_empty()).then_some(CameraEvent::BarcodesDetected { barcodes })
        }
        DetectorKind::Face => {
            let faces: Vec<FaceDetection> = detections
                .into_iter()
                .filter_map(|d| match d {
                    Detection::Face(face) => Some(face),
                    _ => None,
                })
                .collect();
            Some(CameraEvent::FacesDetected { faces })
        }
        DetectorKind::Text => {
            let blocks: Vec<TextBlock> = detections
                .into_iter()
                .filter_map(|d| match d {
                    Detection::Text(block) => Some(block),
                    _ => None,
                })
                .collect();
            (!blocks.is_empty()).then_some(CameraEvent::TextRecognized { blocks })
        }
    }
}
