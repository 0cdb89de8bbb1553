// SPDX-License-Identifier: MPL-2.0

//! Capture pipelines
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌───────────────┐
//! │   Settings   │ ──▶ │  Request config    │ ──▶ │ Repeating     │
//! │ (flash, zoom │     │  (3A, crop region) │     │ preview       │
//! │  focus, wb)  │     └────────────────────┘     └───────────────┘
//! └──────────────┘               │
//!                                ▼
//!                      ┌────────────────────┐     ┌───────────────┐
//!  capture results ──▶ │  State machine     │ ──▶ │ Still request │
//!                      │  (AF/AE/capture)   │     │ (JPEG)        │
//!                      └────────────────────┘     └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Request configuration, still-capture state machine and
//!   still request construction

pub mod photo;
