//! Storage backend abstraction.

use async_trait::async_trait;
use dynamik_common::{DynamikError, Result};

/// Top-level document folders under the base data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    /// Uploaded event logs, content-addressed.
    Logs,
    /// Experiment configs, status documents and drift details.
    Results,
    /// In-progress wizard state.
    Drafts,
}

impl Folder {
    pub fn as_str(self) -> &'static str {
        match self {
            Folder::Logs => "logs",
            Folder::Results => "results",
            Folder::Drafts => "drafts",
        }
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write `content` unless `name` already exists. Returns `true` when this
    /// call created the document. Must be atomic: of two concurrent callers
    /// exactly one observes `true`.
    async fn create_if_absent(&self, folder: Folder, name: &str, content: &[u8]) -> Result<bool>;

    /// Create or replace a document.
    async fn put(&self, folder: Folder, name: &str, content: &[u8]) -> Result<()>;

    /// Read a document; `NotFound` if absent.
    async fn read(&self, folder: Folder, name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, folder: Folder, name: &str) -> Result<bool>;
}

/// Reject names that could escape their folder.
pub(crate) fn checked_name(folder: Folder, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(&['/', '\\', '\0'][..]);
    if bad {
        return Err(DynamikError::NotFound(format!("{folder}/{name}")));
    }
    Ok(())
}
