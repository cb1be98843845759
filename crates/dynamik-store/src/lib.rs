//! dynamik Document Store
//!
//! Persists experiment configurations, status documents, drift details,
//! uploaded logs and wizard drafts as JSON/CSV files under a base directory.
//!
//! Experiment and result documents are write-once: they are created with an
//! atomic create-if-absent, so the first writer wins and later writers are
//! no-ops. Drafts are the only documents that are overwritten.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dynamik_store::{ExperimentStore, FsStore};
//!
//! # async fn run() -> dynamik_common::Result<()> {
//! let store = ExperimentStore::new(Arc::new(FsStore::new("../dynamik-data")));
//! let status = store.read_status("0123456789abcdef0123456789abcdef").await?;
//! println!("{}", status.state());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod experiments;
pub mod fs;

pub use backend::{DocumentStore, Folder};
pub use experiments::ExperimentStore;
pub use fs::FsStore;
