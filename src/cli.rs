// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing cameras of the virtual provider
//! - Running a full still capture against the virtual camera
//! - Printing the effective configuration

use camera_bridge::backends::camera::enumeration::list_cameras as enumerate_cameras;
use camera_bridge::backends::camera::types::{AeState, AfState, CaptureResult, Facing, Size};
use camera_bridge::backends::virtual_camera::VirtualCameraProvider;
use camera_bridge::storage::FileStorage;
use camera_bridge::{CameraEvent, CameraSession, Config, PictureOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Portrait phone screen used as the preview surface
const PREVIEW_SURFACE: Size = Size::new(1080, 1920);

/// How long to wait for the session or a picture before giving up
const TIMEOUT: Duration = Duration::from_secs(5);

/// Options of the `simulate` command
pub struct SimulateOptions {
    pub ae_sequence: String,
    pub front: bool,
    pub flash: i32,
    pub autofocus: bool,
    pub quality: Option<f64>,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

/// List all cameras of the virtual provider
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let provider = VirtualCameraProvider::phone();
    let cameras = enumerate_cameras(&provider)?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        let facing = camera
            .facing
            .map(|facing| format!("{:?}", facing).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        let flash = if camera.flash { ", flash" } else { "" };
        println!("  [{}] {}{}", camera.id, facing, flash);
    }

    Ok(())
}

/// Parse a comma separated list of AE state names
fn parse_ae_sequence(sequence: &str) -> Result<Vec<AeState>, String> {
    sequence
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| AeState::parse(s).ok_or_else(|| format!("Unknown AE state '{}'", s.trim())))
        .collect()
}

/// Poll a session query until it holds
fn wait_for(
    mut condition: impl FnMut() -> camera_bridge::AppResult<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = Instant::now() + TIMEOUT;
    while !condition()? {
        if Instant::now() > deadline {
            return Err("Timed out waiting for the camera".into());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

/// Take one picture on the virtual camera, printing every event as JSON
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let ae_sequence = parse_ae_sequence(&options.ae_sequence)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let mut config = Config::load_or_default();
    config.facing = if options.front {
        Facing::Front
    } else {
        Facing::Back
    };
    config.auto_focus = options.autofocus;
    let directory = options
        .output
        .clone()
        .unwrap_or_else(|| config.photo_directory());

    let provider = VirtualCameraProvider::phone();
    let control = provider.control();
    let (session, mut events) = CameraSession::builder(Box::new(provider))
        .config(config)
        .persistence(Arc::new(FileStorage::new(directory)))
        .runtime(runtime.handle().clone())
        .spawn()?;

    session.set_flash_raw(options.flash);
    session.set_preview_surface(PREVIEW_SURFACE);
    session.start();
    wait_for(|| session.is_preview_running())?;

    session.take_picture(PictureOptions {
        quality: options.quality,
        do_not_save: options.dry_run,
        ..Default::default()
    });
    for ae_state in ae_sequence {
        control.emit_capture_result(CaptureResult::preview(
            Some(AfState::FocusedLocked),
            Some(ae_state),
        ));
    }

    let outcome = runtime.block_on(async {
        loop {
            let event = tokio::time::timeout(TIMEOUT, events.recv()).await.ok()??;
            println!("{}", serde_json::to_string(&event).ok()?);
            match event {
                CameraEvent::PictureSaved { .. } => return Some(Ok(())),
                CameraEvent::PictureFailed { message } | CameraEvent::MountError { message } => {
                    return Some(Err(message));
                }
                _ => {}
            }
        }
    });

    println!("Final capture state: {:?}", session.capture_state()?);
    session.shutdown();

    match outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(message)) => Err(message.into()),
        None => Err("Picture was not taken; check the AE sequence".into()),
    }
}

/// Print the configuration that a session would start with
pub fn show_config(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match path.or_else(Config::default_path) {
        Some(path) => {
            println!("# {}", path.display());
            Config::load(&path)?
        }
        None => Config::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
