//! Backup Guard - The Original Is Preserved Exactly Once

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::emit::fs_error;
use crate::pipeline::SplitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupOutcome {
    Created,
    AlreadyPresent,
    /// Dry run: a backup would be created.
    Planned,
}

#[derive(Debug, Clone)]
pub struct BackupGuard {
    path: PathBuf,
}

impl BackupGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Outcome `preserve` would have, without writing.
    pub fn plan(&self) -> BackupOutcome {
        if self.exists() {
            BackupOutcome::AlreadyPresent
        } else {
            BackupOutcome::Planned
        }
    }

    /// Write `original` unless a backup already exists. An existing backup
    /// is never touched.
    pub fn preserve(&self, original: &str) -> Result<BackupOutcome, SplitError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::info!("backup {} already present, leaving it untouched", self.path.display());
                return Ok(BackupOutcome::AlreadyPresent);
            }
            Err(e) => return Err(fs_error(&self.path)(e)),
        };
        file.write_all(original.as_bytes()).map_err(fs_error(&self.path))?;
        tracing::info!("backed up original to {}", self.path.display());
        Ok(BackupOutcome::Created)
    }
}
