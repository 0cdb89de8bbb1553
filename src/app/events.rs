// SPDX-License-Identifier: GPL-3.0-only

//! Events delivered to the embedding application

use crate::app::frame_processor::types::{BarcodeDetection, FaceDetection, TextBlock};
use crate::storage::SavedPicture;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Sending half of the event channel
pub type EventSender = tokio::sync::mpsc::UnboundedSender<CameraEvent>;

/// Receiving half of the event channel
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<CameraEvent>;

/// Outbound camera event
///
/// Serialized with a `type` tag so it can be forwarded over a bridge as is.
/// Image payloads are serialized as their length only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CameraEvent {
    CameraOpened,
    CameraClosed,
    /// JPEG bytes of a still capture, before persistence
    PictureTaken {
        #[serde(rename = "byteLength", serialize_with = "byte_length")]
        data: Arc<[u8]>,
        device_orientation: i32,
        software_rotation: i32,
    },
    PictureSaved {
        picture: SavedPicture,
    },
    PictureFailed {
        message: String,
    },
    /// Luma plane of a scan frame
    FramePreview {
        #[serde(rename = "byteLength", serialize_with = "byte_length")]
        data: Arc<[u8]>,
        width: u32,
        height: u32,
        orientation: i32,
    },
    BarcodesDetected {
        barcodes: Vec<BarcodeDetection>,
    },
    FacesDetected {
        faces: Vec<FaceDetection>,
    },
    TextRecognized {
        blocks: Vec<TextBlock>,
    },
    MountError {
        message: String,
    },
}

fn byte_length<S: Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(data.len() as u64)
}

impl CameraEvent {
    /// Event name as seen by the caller
    pub fn name(&self) -> &'static str {
        match self {
            CameraEvent::CameraOpened => "cameraOpened",
            CameraEvent::CameraClosed => "cameraClosed",
            CameraEvent::PictureTaken { .. } => "pictureTaken",
            CameraEvent::PictureSaved { .. } => "pictureSaved",
            CameraEvent::PictureFailed { .. } => "pictureFailed",
            CameraEvent::FramePreview { .. } => "framePreview",
            CameraEvent::BarcodesDetected { .. } => "barcodesDetected",
            CameraEvent::FacesDetected { .. } => "facesDetected",
            CameraEvent::TextRecognized { .. } => "textRecognized",
            CameraEvent::MountError { .. } => "mountError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = CameraEvent::PictureTaken {
            data: Arc::from(vec![1u8, 2, 3]),
            device_orientation: 90,
            software_rotation: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pictureTaken");
        assert_eq!(json["byteLength"], 3);
        assert_eq!(json["deviceOrientation"], 90);
        assert_eq!(event.name(), "pictureTaken");
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&CameraEvent::CameraOpened).unwrap();
        assert_eq!(json, r#"{"type":"cameraOpened"}"#);
    }
}
