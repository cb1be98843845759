//! Filesystem backend.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dynamik_common::{DynamikError, Result};

use crate::backend::{checked_name, DocumentStore, Folder};

/// Documents live at `{base}/{folder}/{name}`.
#[derive(Debug, Clone)]
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn folder_path(&self, folder: Folder) -> PathBuf {
        self.base.join(folder.as_str())
    }

    /// Write `content` to a temp file next to the target, then move it into
    /// place. Without `replace` an existing target is left untouched and
    /// `false` is returned. The temp file is removed on every failure path.
    async fn write_atomic(&self, folder: Folder, name: &str, content: &[u8], replace: bool) -> Result<bool> {
        let dir = self.folder_path(folder);
        let target = dir.join(name);
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::Builder::new().prefix(".").suffix(".tmp").tempfile_in(&dir)?;
            tmp.write_all(&content)?;

            let persisted = if replace { tmp.persist(&target) } else { tmp.persist_noclobber(&target) };
            match persisted {
                Ok(_) => Ok(true),
                Err(e) if !replace && e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e.error),
            }
        })
        .await
        .map_err(|e| DynamikError::Io(std::io::Error::other(e)))?
        .map_err(DynamikError::from)
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn create_if_absent(&self, folder: Folder, name: &str, content: &[u8]) -> Result<bool> {
        checked_name(folder, name)?;
        let target = self.folder_path(folder).join(name);
        if tokio::fs::try_exists(&target).await? {
            return Ok(false);
        }

        // The no-clobber persist fails when the target exists, so the
        // document appears complete or not at all.
        let created = self.write_atomic(folder, name, content, false).await?;
        if created {
            tracing::debug!(folder = %folder, name, "Document created");
        } else {
            tracing::debug!(folder = %folder, name, "Document already exists, skipping write");
        }
        Ok(created)
    }

    async fn put(&self, folder: Folder, name: &str, content: &[u8]) -> Result<()> {
        checked_name(folder, name)?;
        self.write_atomic(folder, name, content, true).await?;
        Ok(())
    }

    async fn read(&self, folder: Folder, name: &str) -> Result<Vec<u8>> {
        checked_name(folder, name)?;
        let path = self.folder_path(folder).join(name);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DynamikError::NotFound(format!("{folder}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, folder: Folder, name: &str) -> Result<bool> {
        if checked_name(folder, name).is_err() {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(self.folder_path(folder).join(name)).await?)
    }
}
