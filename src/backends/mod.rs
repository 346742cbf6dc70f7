// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources
//!
//! - [`camera`]: backend traits, frame types and the V4L2 implementation
//! - [`virtual_camera`]: still-image source for running without hardware

pub mod camera;
pub mod virtual_camera;
