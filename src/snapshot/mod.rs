//! Hardlinked point-in-time copies.
//!
//! A snapshot is a `cp -rl` of a tree into a directory named after the
//! backup date. Unchanged files share their inode with the mirror and with
//! every earlier snapshot, so only changed files take new space.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::info;

use crate::config::ToolConfig;
use crate::process::{CommandRunner, ProcessError};
use crate::transfer::CURRENT_DIR;

mod label;

pub use label::SnapshotLabel;

/// Errors raised while creating a snapshot.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SnapshotError {
    /// Raised when the tree to snapshot does not exist.
    #[error("snapshot source missing: {path}")]
    MissingSource {
        /// Directory that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when a snapshot for the label already exists.
    #[error("snapshot already exists: {path}")]
    AlreadyExists {
        /// Existing snapshot directory.
        path: Utf8PathBuf,
    },
    /// Raised when the destination directory cannot be created.
    #[error("failed to create {path}: {message}")]
    Filesystem {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the copy tool cannot be started.
    #[error(transparent)]
    Spawn(#[from] ProcessError),
    /// Raised when the copy tool exits with a non-zero status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CopyFailed {
        /// Copy tool used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}

/// Creates dated hardlinked copies through the configured copy tool.
#[derive(Clone, Debug)]
pub struct SnapshotManager<R: CommandRunner> {
    runner: R,
    cp_bin: String,
}

impl<R: CommandRunner> SnapshotManager<R> {
    /// Creates a manager using the copy tool from `tools`.
    #[must_use]
    pub fn new(runner: R, tools: &ToolConfig) -> Self {
        Self {
            runner,
            cp_bin: tools.cp_bin.clone(),
        }
    }

    /// Links `destination/current` into `destination/<label>`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingSource`] when `current` is absent,
    /// [`SnapshotError::AlreadyExists`] when the label is taken, or a copy
    /// error from the tool.
    pub fn snapshot(
        &self,
        destination: &Utf8Path,
        label: SnapshotLabel,
    ) -> Result<Utf8PathBuf, SnapshotError> {
        let current = destination.join(CURRENT_DIR);
        self.link_tree(&current, destination, label)
    }

    /// Links a local `source` tree directly into `destination/<label>`,
    /// creating `destination` first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Filesystem`] when `destination` cannot be
    /// created, and otherwise the same errors as [`SnapshotManager::snapshot`].
    pub fn link_local(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
        label: SnapshotLabel,
    ) -> Result<Utf8PathBuf, SnapshotError> {
        Dir::create_ambient_dir_all(destination, ambient_authority()).map_err(|err| {
            SnapshotError::Filesystem {
                path: destination.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        self.link_tree(source, destination, label)
    }

    fn link_tree(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
        label: SnapshotLabel,
    ) -> Result<Utf8PathBuf, SnapshotError> {
        if !source.is_dir() {
            return Err(SnapshotError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        let target = destination.join(label.to_string());
        if target.exists() {
            return Err(SnapshotError::AlreadyExists { path: target });
        }

        let args = [
            OsString::from("-rl"),
            OsString::from(source.as_str()),
            OsString::from(target.as_str()),
        ];
        let output = self.runner.run(&self.cp_bin, &args)?;
        if !output.is_success() {
            return Err(SnapshotError::CopyFailed {
                program: self.cp_bin.clone(),
                status: output.code,
                status_text: output.status_text(),
                stderr: output.stderr,
            });
        }

        info!(source = %source, snapshot = %target, "snapshot created");
        Ok(target)
    }
}
