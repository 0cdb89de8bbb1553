// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! This module implements QR code detection using the rqrr crate.
//! Scan frames already carry the luma plane, so the Y bytes are fed to
//! rqrr directly without any color conversion.

use crate::app::frame_processor::dispatcher::{DetectorKind, ScanFrame, VisionDetector};
use crate::app::frame_processor::types::{BarcodeDetection, Detection, FrameRegion};
use tracing::{debug, trace, warn};

/// Symbology reported for codes found by this detector
const QR_CODE: &str = "QR_CODE";

/// QR code detector
///
/// Finds and decodes QR codes in the luma plane of scan frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl VisionDetector for QrDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Barcode
    }

    fn detect<'a>(&'a self, frame: &'a ScanFrame) -> Box<dyn Iterator<Item = Detection> + 'a> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        if width == 0 || height == 0 || frame.data.len() < width * height {
            warn!(
                width,
                height,
                bytes = frame.data.len(),
                "Scan frame smaller than its dimensions, skipping QR detection"
            );
            return Box::new(std::iter::empty());
        }

        let start = std::time::Instant::now();
        let luma = &frame.data;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
        let grids = prepared.detect_grids();
        trace!(
            count = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid search complete"
        );

        let (frame_width, frame_height) = (frame.width, frame.height);
        // Grids borrow the prepared image, so decode before it goes away
        let found: Vec<Detection> = grids
            .into_iter()
            .filter_map(|grid| {
                let content = match grid.decode() {
                    Ok((_meta, content)) => content,
                    Err(e) => {
                        debug!(error = ?e, "Failed to decode QR code");
                        return None;
                    }
                };

                let corners: Vec<(i32, i32)> = grid.bounds.iter().map(|p| (p.x, p.y)).collect();
                let bounds = FrameRegion::bounding(&corners, frame_width, frame_height);
                debug!(
                    content = %content,
                    x = bounds.x,
                    y = bounds.y,
                    width = bounds.width,
                    height = bounds.height,
                    "Detected QR code"
                );

                Some(Detection::Barcode(BarcodeDetection {
                    data: content,
                    barcode_type: QR_CODE.to_string(),
                    bounds,
                }))
            })
            .collect();

        Box::new(found.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = ScanFrame {
            data: Arc::from(vec![255u8; 64 * 48]),
            width: 64,
            height: 48,
            rotation: 0,
        };
        assert_eq!(QrDetector::new().detect(&frame).count(), 0);
    }

    #[test]
    fn test_short_buffer_is_skipped() {
        let frame = ScanFrame {
            data: Arc::from(vec![0u8; 10]),
            width: 64,
            height: 48,
            rotation: 0,
        };
        assert_eq!(QrDetector::new().detect(&frame).count(), 0);
    }

    /// Version 1 QR code encoding "rqrr"
    const RQRR_CODE: [&str; 21] = [
        "#######...#...#######",
        "#.....#.###...#.....#",
        "#.###.#..#.##.#.###.#",
        "#.###.#.....#.#.###.#",
        "#.###.#.##.##.#.###.#",
        "#.....#..###..#.....#",
        "#######.#.#.#.#######",
        "..........#..........",
        "#.#.#.#.....#...#..#.",
        "#..##......#.#.#.#..#",
        ".#.##.##.###.###.####",
        "##...#..######.##..##",
        "..#.###.#..#.###.#..#",
        "........###...#..#..#",
        "#######..##.#...#..##",
        "#.....#..##...#....#.",
        "#.###.#.#...#.#.##.##",
        "#.###.#..#.#.#.#.#.#.",
        "#.###.#.##.#.###....#",
        "#.....#...####.###.#.",
        "#######.#..#.###..###",
    ];

    /// Render a module grid as a luma frame with a quiet zone
    fn render(modules: &[&str], scale: usize, quiet: usize) -> ScanFrame {
        let side = (modules.len() + 2 * quiet) * scale;
        let mut data = vec![255u8; side * side];
        for (row, line) in modules.iter().enumerate() {
            for (col, module) in line.bytes().enumerate() {
                if module != b'#' {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let y = (row + quiet) * scale + dy;
                        let x = (col + quiet) * scale + dx;
                        data[y * side + x] = 0;
                    }
                }
            }
        }
        ScanFrame {
            data: Arc::from(data),
            width: side as u32,
            height: side as u32,
            rotation: 0,
        }
    }

    #[test]
    fn test_decodes_qr_code() {
        let frame = render(&RQRR_CODE, 4, 4);
        let detections: Vec<Detection> = QrDetector::new().detect(&frame).collect();

        assert_eq!(detections.len(), 1);
        let Detection::Barcode(barcode) = &detections[0] else {
            panic!("expected a barcode, got {:?}", detections[0]);
        };
        assert_eq!(barcode.data, "rqrr");
        assert_eq!(barcode.barcode_type, "QR_CODE");
        // Code occupies the middle of the frame after the quiet zone
        assert!(barcode.bounds.x > 0.05 && barcode.bounds.x < 0.25, "{:?}", barcode.bounds);
        assert!(barcode.bounds.width > 0.5 && barcode.bounds.width < 0.9, "{:?}", barcode.bounds);
    }

    #[test]
    fn test_reports_barcode_kind() {
        assert_eq!(QrDetector::new().kind(), DetectorKind::Barcode);
    }
}
