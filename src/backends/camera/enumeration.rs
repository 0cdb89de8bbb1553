// SPDX-License-Identifier: GPL-3.0-only

//! Camera selection and output size negotiation

use super::CameraProvider;
use super::types::{
    AspectRatio, CameraCharacteristics, Facing, HardwareLevel, LensFacing, Size, SizeMap,
};
use crate::constants::{MAX_PREVIEW_HEIGHT, MAX_PREVIEW_WIDTH};
use crate::errors::CameraError;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Camera chosen for a session
#[derive(Debug, Clone)]
pub struct CameraSelection {
    pub camera_id: String,
    /// Facing actually obtained, which may differ from the requested one
    pub facing: Facing,
    pub characteristics: CameraCharacteristics,
}

/// Entry of the camera list exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub facing: Option<LensFacing>,
    pub flash: bool,
}

fn is_legacy(characteristics: &CameraCharacteristics) -> bool {
    matches!(
        characteristics.hardware_level,
        None | Some(HardwareLevel::Legacy)
    )
}

fn lens_facing(characteristics: &CameraCharacteristics) -> Result<LensFacing, CameraError> {
    characteristics
        .lens_facing
        .ok_or(CameraError::CharacteristicsMissing("lens facing"))
}

/// Pick the camera to open
///
/// A pinned id always wins. Otherwise the first non-legacy camera facing
/// the requested way is used, falling back to the first camera. External
/// cameras are reported as facing back.
pub fn choose_camera(
    provider: &dyn CameraProvider,
    pinned_id: Option<&str>,
    facing: Facing,
) -> Result<CameraSelection, CameraError> {
    if let Some(camera_id) = pinned_id {
        let characteristics = provider.characteristics(camera_id)?;
        if is_legacy(&characteristics) {
            return Err(CameraError::LegacyHardware(camera_id.to_string()));
        }
        let lens = lens_facing(&characteristics)?;
        info!(camera_id, facing = ?lens, "Using pinned camera");
        return Ok(CameraSelection {
            camera_id: camera_id.to_string(),
            facing: lens.as_facing(),
            characteristics,
        });
    }

    let ids = provider.camera_ids()?;
    if ids.is_empty() {
        return Err(CameraError::NoCameraFound);
    }

    for id in &ids {
        let characteristics = provider.characteristics(id)?;
        if is_legacy(&characteristics) {
            debug!(camera_id = %id, "Skipping legacy camera");
            continue;
        }
        let Some(lens) = characteristics.lens_facing else {
            warn!(camera_id = %id, "Camera reports no lens facing, skipped");
            continue;
        };
        let matches = match lens {
            LensFacing::Back => facing == Facing::Back,
            LensFacing::Front => facing == Facing::Front,
            LensFacing::External => false,
        };
        if matches {
            info!(camera_id = %id, facing = %facing, "Selected camera by facing");
            return Ok(CameraSelection {
                camera_id: id.clone(),
                facing,
                characteristics,
            });
        }
    }

    // Nothing faces the requested way: take the first camera as it is
    let camera_id = ids[0].clone();
    let characteristics = provider.characteristics(&camera_id)?;
    if is_legacy(&characteristics) {
        return Err(CameraError::LegacyHardware(camera_id));
    }
    let lens = lens_facing(&characteristics)?;
    info!(camera_id = %camera_id, facing = ?lens, "No camera with requested facing, using first camera");
    Ok(CameraSelection {
        camera_id,
        facing: lens.as_facing(),
        characteristics,
    })
}

/// List cameras with their facing
pub fn list_cameras(provider: &dyn CameraProvider) -> Result<Vec<CameraInfo>, CameraError> {
    let mut cameras = Vec::new();
    for id in provider.camera_ids()? {
        let characteristics = provider.characteristics(&id)?;
        cameras.push(CameraInfo {
            id,
            facing: characteristics.lens_facing,
            flash: characteristics.flash_available == Some(true),
        });
    }
    Ok(cameras)
}

/// Preview and picture sizes grouped by aspect ratio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSizes {
    pub preview: SizeMap,
    pub picture: SizeMap,
}

impl StreamSizes {
    /// Collect sizes from the characteristics
    ///
    /// Preview sizes are capped at full HD, and ratios with no matching
    /// picture size are dropped so preview and still framing agree.
    pub fn collect(characteristics: &CameraCharacteristics) -> Result<Self, CameraError> {
        let mut preview = SizeMap::new();
        for size in &characteristics.preview_sizes {
            if size.width <= MAX_PREVIEW_WIDTH && size.height <= MAX_PREVIEW_HEIGHT {
                preview.add(*size);
            }
        }

        let mut picture = SizeMap::new();
        for size in &characteristics.picture_sizes {
            picture.add(*size);
        }

        let unmatched: Vec<AspectRatio> = preview
            .ratios()
            .filter(|ratio| !picture.contains(ratio))
            .collect();
        for ratio in &unmatched {
            preview.remove(ratio);
        }

        if preview.is_empty() {
            return Err(CameraError::CharacteristicsMissing("preview stream sizes"));
        }
        if picture.is_empty() {
            return Err(CameraError::CharacteristicsMissing("picture stream sizes"));
        }

        Ok(Self { preview, picture })
    }

    /// The requested ratio when supported, otherwise the smallest supported one
    pub fn resolve_aspect_ratio(&self, requested: AspectRatio) -> AspectRatio {
        if self.preview.contains(&requested) {
            return requested;
        }
        self.preview.ratios().next().unwrap_or(requested)
    }

    /// Still output size: the explicit picture size, else the largest for the ratio
    pub fn picture_size(&self, ratio: &AspectRatio, requested: Option<Size>) -> Option<Size> {
        requested.or_else(|| self.picture.largest(ratio))
    }

    /// Scan output size: the largest preview size for the ratio
    pub fn scan_size(&self, ratio: &AspectRatio) -> Option<Size> {
        self.preview.largest(ratio)
    }
}

/// Smallest candidate covering the surface, else the largest candidate
///
/// `candidates` must be sorted smallest first.
pub fn choose_optimal_size(candidates: &[Size], surface: Size) -> Option<Size> {
    let longer = surface.width.max(surface.height);
    let shorter = surface.width.min(surface.height);

    candidates
        .iter()
        .find(|size| size.width >= longer && size.height >= shorter)
        .or_else(|| candidates.last())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{VirtualCameraProvider, VirtualCameraSpec};

    fn provider(cameras: Vec<VirtualCameraSpec>) -> VirtualCameraProvider {
        VirtualCameraProvider::new(cameras)
    }

    #[test]
    fn test_choose_camera_by_facing() {
        let provider = provider(vec![
            VirtualCameraSpec::back("0"),
            VirtualCameraSpec::front("1"),
        ]);
        let selection = choose_camera(&provider, None, Facing::Front).unwrap();
        assert_eq!(selection.camera_id, "1");
        assert_eq!(selection.facing, Facing::Front);
    }

    #[test]
    fn test_choose_camera_falls_back_to_first() {
        let provider = provider(vec![VirtualCameraSpec::external("usb")]);
        let selection = choose_camera(&provider, None, Facing::Front).unwrap();
        assert_eq!(selection.camera_id, "usb");
        assert_eq!(selection.facing, Facing::Back);
    }

    #[test]
    fn test_pinned_camera_wins() {
        let provider = provider(vec![
            VirtualCameraSpec::back("0"),
            VirtualCameraSpec::front("1"),
        ]);
        let selection = choose_camera(&provider, Some("1"), Facing::Back).unwrap();
        assert_eq!(selection.camera_id, "1");
        assert_eq!(selection.facing, Facing::Front);
    }

    #[test]
    fn test_no_camera() {
        let provider = provider(Vec::new());
        assert_eq!(
            choose_camera(&provider, None, Facing::Back).unwrap_err(),
            CameraError::NoCameraFound
        );
    }

    #[test]
    fn test_legacy_cameras_are_skipped() {
        let mut legacy = VirtualCameraSpec::front("0");
        legacy.characteristics.hardware_level = Some(HardwareLevel::Legacy);
        let provider = provider(vec![legacy, VirtualCameraSpec::front("1")]);
        let selection = choose_camera(&provider, None, Facing::Front).unwrap();
        assert_eq!(selection.camera_id, "1");
    }

    #[test]
    fn test_camera_without_lens_facing_is_skipped() {
        let mut unknown = VirtualCameraSpec::back("0");
        unknown.characteristics.lens_facing = None;
        let provider = provider(vec![unknown, VirtualCameraSpec::back("1")]);
        let selection = choose_camera(&provider, None, Facing::Back).unwrap();
        assert_eq!(selection.camera_id, "1");
        assert_eq!(selection.facing, Facing::Back);
    }

    #[test]
    fn test_missing_lens_facing_on_fallback_is_fatal() {
        let mut spec = VirtualCameraSpec::back("0");
        spec.characteristics.lens_facing = None;
        let provider = provider(vec![spec]);
        assert_eq!(
            choose_camera(&provider, None, Facing::Back).unwrap_err(),
            CameraError::CharacteristicsMissing("lens facing")
        );
    }

    #[test]
    fn test_optimal_size() {
        let candidates = [
            Size::new(640, 480),
            Size::new(1280, 960),
            Size::new(1440, 1080),
        ];
        // Portrait surface: longer side is the height
        assert_eq!(
            choose_optimal_size(&candidates, Size::new(720, 960)),
            Some(Size::new(1280, 960))
        );
        assert_eq!(
            choose_optimal_size(&candidates, Size::new(4000, 3000)),
            Some(Size::new(1440, 1080))
        );
        assert_eq!(choose_optimal_size(&[], Size::new(1, 1)), None);
    }

    #[test]
    fn test_stream_sizes_drop_unmatched_ratios() {
        let characteristics = CameraCharacteristics {
            preview_sizes: vec![
                Size::new(1920, 1080),
                Size::new(1440, 1080),
                Size::new(1080, 1080),
                Size::new(3840, 2160),
            ],
            picture_sizes: vec![Size::new(4000, 3000), Size::new(3840, 2160)],
            ..Default::default()
        };
        let sizes = StreamSizes::collect(&characteristics).unwrap();
        let ratios: Vec<String> = sizes.preview.ratios().map(|r| r.to_string()).collect();
        assert_eq!(ratios, vec!["4:3", "16:9"]);
        assert_eq!(
            sizes.preview.largest(&AspectRatio::new(16, 9).unwrap()),
            Some(Size::new(1920, 1080))
        );

        let square = AspectRatio::new(1, 1).unwrap();
        assert_eq!(
            sizes.resolve_aspect_ratio(square),
            AspectRatio::new(4, 3).unwrap()
        );
    }

    #[test]
    fn test_stream_sizes_require_sizes() {
        let characteristics = CameraCharacteristics::default();
        assert!(StreamSizes::collect(&characteristics).is_err());
    }
}
