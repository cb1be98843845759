//! dynamik-common — Shared types, errors, and settings used across all dynamik crates.
//!
//! - Experiment / status / drift documents exchanged with the worker
//! - Error taxonomy
//! - Environment-driven settings
//! - Content hashing and human-unit helpers

pub mod error;
pub mod ids;
pub mod model;
pub mod settings;
pub mod units;

// Re-export commonly used types
pub use error::{DynamikError, RejectionKind, Result};
pub use model::{
    AlgorithmConfiguration, DriftCause, DriftDetails, DriftOverview, ExecutionState,
    ExecutionStatus, Experiment, LogField, LogMapping, Status, Window, DISCOVER_ENABLEMENT,
};
pub use settings::Settings;
