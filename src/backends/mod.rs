// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Session Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  camera (traits, │  │ virtual_camera  │  │
//! │  │  enumeration)    │  │ (in-process)    │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Platform camera traits, metadata types and size negotiation
//! - [`virtual_camera`]: Scriptable in-process camera used by the CLI and tests

pub mod camera;
pub mod virtual_camera;
