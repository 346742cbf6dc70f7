// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │ Capture      │ ──▶ │  Scan Loop         │ ──▶ │ Event        │
//! │ Device       │     │  - every frame:    │     │ Channel      │
//! │ (V4L2/still) │     │    320x240 → QR    │     │  - previews  │
//! │              │     │  - every 6th:      │     │  - decoded   │
//! │              │     │    gray JPEG       │     │  - status    │
//! └──────────────┘     └────────────────────┘     └──────────────┘
//! ```
//!
//! The loop runs on its own thread and never touches presentation state;
//! whoever drains the event channel owns that.
//!
//! # Modules
//!
//! - [`scan`]: session control, the scan loop, frame transforms and decoding

pub mod scan;
