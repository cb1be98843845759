//! dynamik-experiments — Experiment lifecycle and the setup wizard.
//!
//! - [`ExperimentCoordinator`]: deduplicated submission, document reads,
//!   live status streams
//! - [`wizard`]: the three-step mapping / configuration / review flow and
//!   its validity gating
//! - [`Draft`]: server-side wizard state between upload and submission
//! - [`upload`] and [`automap`]: upload checks, header parsing and
//!   column suggestions

pub mod automap;
pub mod coordinator;
pub mod draft;
pub mod upload;
pub mod wizard;

pub use coordinator::ExperimentCoordinator;
pub use draft::{Draft, StoredLog};
pub use upload::{UploadPolicy, UploadedFile};
pub use wizard::{NavAction, Outcome, Step, Toast, WizardState};
