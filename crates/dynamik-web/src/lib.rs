//! dynamik-web — Web front-end for dynamik
//! Provides:
//!   - Event log upload
//!   - Experiment setup wizard (mapping, configuration, review)
//!   - Results pages with live progress over SSE
//!   - Drift detail pages with per-cause chart panels
//!   - JSON downloads and a small read API

pub mod error;
pub mod handlers;
pub mod render;
pub mod router;
pub mod sse;
pub mod state;
