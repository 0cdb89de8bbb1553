// SPDX-License-Identifier: GPL-3.0-only

//! Session handler modules
//!
//! Each module adds one group of `SessionCore` methods, all executed on
//! the session thread.

pub mod camera;
pub mod capture;
pub mod controls;
pub mod device;
