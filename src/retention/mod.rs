//! Age-based pruning of dated snapshots.
//!
//! Snapshots older than the retention window are deleted unless they were
//! taken on the first of a month. Entries whose names are not `YYYY-MM-DD`
//! dates are never touched.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::info;

use crate::config::{DEFAULT_RETENTION_DAYS, ToolConfig};
use crate::process::{CommandRunner, ProcessError};
use crate::snapshot::SnapshotLabel;

/// Errors raised while pruning snapshots.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RetentionError {
    /// Raised when the destination cannot be listed.
    #[error("failed to list {path}: {message}")]
    Filesystem {
        /// Directory that could not be listed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the delete tool cannot be started.
    #[error(transparent)]
    Spawn(#[from] ProcessError),
    /// Raised when the delete tool exits with a non-zero status.
    #[error("{program} failed to delete {path} with status {status_text}: {stderr}")]
    DeleteFailed {
        /// Delete tool used for the attempted operation.
        program: String,
        /// Snapshot that could not be deleted.
        path: Utf8PathBuf,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}

/// How long snapshots are kept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetentionPolicy {
    keep_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

/// Which snapshots a prune keeps and which it deletes, both in ascending
/// date order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RetentionPlan {
    /// Snapshots that survive the prune.
    pub retained: Vec<SnapshotLabel>,
    /// Snapshots older than the cutoff that are not monthly anchors.
    pub expired: Vec<SnapshotLabel>,
}

impl RetentionPolicy {
    /// Keeps snapshots for `keep_days` days.
    #[must_use]
    pub const fn new(keep_days: u32) -> Self {
        Self { keep_days }
    }

    /// The oldest date that is still inside the retention window.
    #[must_use]
    pub fn cutoff(self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.keep_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Returns `true` when `label` should be deleted on `today`.
    #[must_use]
    pub fn is_expired(self, label: SnapshotLabel, today: NaiveDate) -> bool {
        label.date() < self.cutoff(today) && !label.is_monthly_anchor()
    }

    /// Splits directory `names` into retained and expired snapshots.
    /// Names that are not snapshot labels are ignored.
    #[must_use]
    pub fn plan<I, S>(self, names: I, today: NaiveDate) -> RetentionPlan
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<SnapshotLabel> = names
            .into_iter()
            .filter_map(|name| SnapshotLabel::parse(name.as_ref()))
            .collect();
        labels.sort_unstable();
        labels.dedup();

        let (expired, retained): (Vec<_>, Vec<_>) = labels
            .into_iter()
            .partition(|label| self.is_expired(*label, today));
        RetentionPlan { retained, expired }
    }
}

/// Applies a [`RetentionPolicy`] to destination directories.
#[derive(Clone, Debug)]
pub struct RetentionEnforcer<R: CommandRunner> {
    runner: R,
    rm_bin: String,
    policy: RetentionPolicy,
}

impl<R: CommandRunner> RetentionEnforcer<R> {
    /// Creates an enforcer using the delete tool and window from `tools`.
    #[must_use]
    pub fn new(runner: R, tools: &ToolConfig) -> Self {
        Self {
            runner,
            rm_bin: tools.rm_bin.clone(),
            policy: RetentionPolicy::new(tools.retention_days),
        }
    }

    /// The policy this enforcer applies.
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Deletes expired snapshots under `destination`, oldest first, and
    /// returns their names. Under `dry_run` nothing is deleted, the plan is
    /// logged, and the returned list is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::Filesystem`] when the destination cannot be
    /// listed, or a delete error from the tool. Deletions completed before
    /// the failure are not rolled back.
    pub fn prune(
        &self,
        destination: &Utf8Path,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<Vec<String>, RetentionError> {
        if !destination.is_dir() {
            return Ok(Vec::new());
        }
        let names = list_entries(destination)?;
        let plan = self.policy.plan(&names, today);

        if dry_run {
            for label in &plan.expired {
                info!(snapshot = %destination.join(label.to_string()), "would prune snapshot");
            }
            return Ok(Vec::new());
        }

        let mut deleted = Vec::with_capacity(plan.expired.len());
        for label in plan.expired {
            let name = label.to_string();
            self.delete(&destination.join(&name))?;
            deleted.push(name);
        }
        Ok(deleted)
    }

    fn delete(&self, path: &Utf8Path) -> Result<(), RetentionError> {
        let args = [OsString::from("-rf"), OsString::from(path.as_str())];
        let output = self.runner.run(&self.rm_bin, &args)?;
        if !output.is_success() {
            return Err(RetentionError::DeleteFailed {
                program: self.rm_bin.clone(),
                path: path.to_path_buf(),
                status_text: output.status_text(),
                stderr: output.stderr,
            });
        }
        info!(snapshot = %path, "pruned snapshot");
        Ok(())
    }
}

fn list_entries(destination: &Utf8Path) -> Result<Vec<String>, RetentionError> {
    let io_error = |err: std::io::Error| RetentionError::Filesystem {
        path: destination.to_path_buf(),
        message: err.to_string(),
    };
    let dir = Dir::open_ambient_dir(destination, ambient_authority()).map_err(io_error)?;
    let mut names = Vec::new();
    for entry in dir.entries().map_err(io_error)? {
        let name = entry.and_then(|item| item.file_name()).map_err(io_error)?;
        names.push(name);
    }
    Ok(names)
}
