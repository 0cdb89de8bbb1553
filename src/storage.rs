// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for captured pictures
//!
//! Turns the JPEG bytes delivered by the still output into a saved file
//! and a descriptor for the caller. Runs on the blocking pool.

use crate::constants::PHOTO_SUBDIRECTORY;
use crate::errors::PhotoError;
use crate::pipelines::photo::PictureOptions;
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JPEG quality used when re-encoding without an explicit quality
const DEFAULT_REENCODE_QUALITY: u8 = 95;

/// Descriptor of a processed picture
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPicture {
    /// `file://` URI of the written file; `None` when saving was skipped
    pub uri: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Device orientation at capture time, in degrees
    pub device_orientation: i32,
    /// Minimal EXIF-style tags, only when requested
    pub exif: Option<Map<String, Value>>,
}

/// Turns JPEG bytes plus options into a saved picture
pub trait PicturePersistence: Send + Sync {
    fn save(
        &self,
        jpeg: &[u8],
        options: &PictureOptions,
        device_orientation: i32,
    ) -> Result<SavedPicture, PhotoError>;
}

/// Writes pictures as files in a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(default_photo_dir())
    }
}

/// `<pictures>/camera`, falling back to the home directory
pub fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(PHOTO_SUBDIRECTORY)
}

/// `IMG_<timestamp>_<8 hex chars>.jpg`
pub fn picture_filename() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("IMG_{}_{}.jpg", timestamp, &id[..8])
}

fn jpeg_dimensions(jpeg: &[u8]) -> Result<(u32, u32), PhotoError> {
    let reader = image::ImageReader::new(Cursor::new(jpeg)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Flip horizontally and re-encode
fn mirror_jpeg(jpeg: &[u8], quality: u8) -> Result<Vec<u8>, PhotoError> {
    let decoded = image::load_from_memory(jpeg)?;
    let flipped = decoded.fliph().to_rgb8();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&flipped)?;
    Ok(buffer)
}

fn exif_map(width: u32, height: u32, device_orientation: i32) -> Map<String, Value> {
    let mut exif = Map::new();
    exif.insert("ImageWidth".into(), Value::from(width));
    exif.insert("ImageLength".into(), Value::from(height));
    exif.insert("Orientation".into(), Value::from(device_orientation));
    exif
}

impl PicturePersistence for FileStorage {
    fn save(
        &self,
        jpeg: &[u8],
        options: &PictureOptions,
        device_orientation: i32,
    ) -> Result<SavedPicture, PhotoError> {
        let (width, height) = jpeg_dimensions(jpeg)?;
        let exif = options
            .exif
            .then(|| exif_map(width, height, device_orientation));

        if options.do_not_save {
            debug!(width, height, "Picture not saved on request");
            return Ok(SavedPicture {
                uri: None,
                width,
                height,
                device_orientation,
                exif,
            });
        }

        let mirrored;
        let bytes = if options.mirror_image {
            let quality = options.jpeg_quality().unwrap_or(DEFAULT_REENCODE_QUALITY);
            mirrored = mirror_jpeg(jpeg, quality)?;
            &mirrored[..]
        } else {
            jpeg
        };

        std::fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(picture_filename());
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), width, height, "Picture saved");

        Ok(SavedPicture {
            uri: Some(format!("file://{}", path.display())),
            width,
            height,
            device_orientation,
            exif,
        })
    }
}
