//! Orchestrates a backup cycle across every configured location.
//!
//! For each location the orchestrator walks the folder list in order. Remote
//! folders are mirrored into `current/`, snapshotted under today's date and
//! pruned; local folders are snapshotted straight from their home directory
//! and pruned. A failed transfer stops the rest of that location, while
//! snapshot and retention failures only affect the folder they occurred in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::config::ToolConfig;
use crate::process::CommandRunner;
use crate::registry::{Location, LocationKind, LocationRegistry};
use crate::retention::{RetentionEnforcer, RetentionError};
use crate::snapshot::{SnapshotError, SnapshotLabel, SnapshotManager};
use crate::transfer::{
    CommandBuilder, TransferError, TransferExecutor, TransferOptions, TransferOutcome,
};

/// Switches supplied on the command line for a single run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunOptions {
    /// Simulate transfers and skip every snapshot and deletion.
    pub dry_run: bool,
    /// Verbosity level forwarded to the transfer tool.
    pub verbosity: u8,
}

/// Shared flag raised when the run should stop starting new work.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that is not yet raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancellationFlag::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors recorded against a single folder.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackupError {
    /// The mirror step failed; the rest of the location is skipped.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
    /// The dated copy could not be created.
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Expired snapshots could not be removed.
    #[error("retention failed: {0}")]
    Retention(#[from] RetentionError),
}

impl BackupError {
    /// Returns `true` when the error stops the remaining folders of the
    /// location.
    #[must_use]
    pub const fn halts_location(&self) -> bool {
        matches!(self, Self::Transfer(_))
    }
}

/// What a successful folder backup produced.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderSummary {
    /// Snapshot created for the run date; `None` under dry-run.
    pub snapshot: Option<SnapshotLabel>,
    /// Names of snapshots deleted by retention.
    pub pruned: Vec<String>,
    /// Diagnostics the transfer tool printed while still succeeding.
    pub warnings: Option<String>,
}

/// Outcome for one folder of a location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FolderReport {
    /// Folder name relative to the location's home.
    pub folder: String,
    /// Summary on success, or the error that stopped this folder.
    pub result: Result<FolderSummary, BackupError>,
}

/// Outcome for one location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocationReport {
    /// Location name.
    pub location: String,
    /// Folders that were attempted, in order.
    pub folders: Vec<FolderReport>,
    /// Set when cancellation stopped the location before it finished.
    pub cancelled: bool,
}

impl LocationReport {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_owned(),
            folders: Vec::new(),
            cancelled: false,
        }
    }

    fn cancelled(location: &str) -> Self {
        Self {
            cancelled: true,
            ..Self::new(location)
        }
    }

    /// Returns `true` when the location ran to completion without errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.folders.iter().all(|report| report.result.is_ok())
    }

    /// Iterates over the folders that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &BackupError)> {
        self.folders.iter().filter_map(|report| {
            report
                .result
                .as_ref()
                .err()
                .map(|err| (report.folder.as_str(), err))
        })
    }
}

/// Aggregated outcome of a backup cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// One report per configured location, in document order.
    pub reports: Vec<LocationReport>,
}

impl RunSummary {
    /// Returns `true` when every location succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(LocationReport::is_success)
    }

    /// Returns `true` when cancellation cut the run short.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.reports.iter().any(|report| report.cancelled)
    }
}

/// Drives the sync, snapshot and prune sequence for every location.
#[derive(Debug)]
pub struct BackupOrchestrator<R: CommandRunner> {
    registry: LocationRegistry,
    options: RunOptions,
    builder: CommandBuilder,
    executor: TransferExecutor<R>,
    snapshots: SnapshotManager<R>,
    retention: RetentionEnforcer<R>,
    cancellation: CancellationFlag,
}

impl<R: CommandRunner + Clone> BackupOrchestrator<R> {
    /// Creates an orchestrator whose collaborators share `runner`.
    #[must_use]
    pub fn new(
        registry: LocationRegistry,
        tools: &ToolConfig,
        options: RunOptions,
        runner: R,
    ) -> Self {
        Self {
            registry,
            options,
            builder: CommandBuilder::new(tools),
            executor: TransferExecutor::new(runner.clone(), options.verbosity),
            snapshots: SnapshotManager::new(runner.clone(), tools),
            retention: RetentionEnforcer::new(runner, tools),
            cancellation: CancellationFlag::new(),
        }
    }
}

impl<R: CommandRunner> BackupOrchestrator<R> {
    /// Replaces the cancellation flag checked between folders.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Backs up every location, labelling new snapshots with `today`.
    #[must_use]
    pub fn run(&self, today: NaiveDate) -> RunSummary {
        let mut reports = Vec::with_capacity(self.registry.list_locations().len());
        for location in self.registry.list_locations() {
            if self.cancellation.is_cancelled() {
                warn!(location = %location.name, "run cancelled, skipping location");
                reports.push(LocationReport::cancelled(&location.name));
                continue;
            }
            reports.push(self.back_up_location(location, today));
        }
        RunSummary { reports }
    }

    fn back_up_location(&self, location: &Location, today: NaiveDate) -> LocationReport {
        let span = info_span!("location", name = %location.name);
        let _entered = span.enter();
        info!(
            remote = location.is_remote(),
            folders = location.folders.len(),
            dry_run = self.options.dry_run,
            "backing up location"
        );

        let mut report = LocationReport::new(&location.name);
        for folder in &location.folders {
            if self.cancellation.is_cancelled() {
                warn!(folder = %folder, "run cancelled, skipping remaining folders");
                report.cancelled = true;
                break;
            }

            let result = self.back_up_folder(location, folder, today);
            let halt = match &result {
                Ok(summary) => {
                    info!(
                        folder = %folder,
                        snapshot = ?summary.snapshot.map(|label| label.to_string()),
                        pruned = summary.pruned.len(),
                        "folder backed up"
                    );
                    false
                }
                Err(err) => {
                    warn!(folder = %folder, error = %err, "folder backup failed");
                    err.halts_location()
                }
            };
            report.folders.push(FolderReport {
                folder: folder.clone(),
                result,
            });
            if halt {
                warn!("skipping remaining folders of location");
                break;
            }
        }
        report
    }

    fn back_up_folder(
        &self,
        location: &Location,
        folder: &str,
        today: NaiveDate,
    ) -> Result<FolderSummary, BackupError> {
        let source = location.source_for(folder);
        let destination = self.registry.destination(location, folder);
        let label = SnapshotLabel::new(today);
        let dry_run = self.options.dry_run;

        let mut summary = FolderSummary::default();
        if source.is_remote() {
            let invocation =
                self.builder
                    .build(&source, &destination, &self.transfer_options(location))?;
            let outcome = self.executor.execute(&invocation)?.into_result(&invocation)?;
            summary.warnings = match outcome {
                TransferOutcome::SuccessWithWarnings { output, warnings } => {
                    debug!(output = %output, "transfer output");
                    Some(warnings)
                }
                TransferOutcome::Success { output } => {
                    debug!(output = %output, "transfer output");
                    None
                }
                TransferOutcome::Failure { .. } => None,
            };
            if !dry_run {
                self.snapshots.snapshot(&destination, label)?;
                summary.snapshot = Some(label);
            }
        } else if !dry_run {
            self.snapshots
                .link_local(source.path(), &destination, label)?;
            summary.snapshot = Some(label);
        }

        summary.pruned = self.retention.prune(&destination, today, dry_run)?;
        Ok(summary)
    }

    fn transfer_options(&self, location: &Location) -> TransferOptions {
        let (bandwidth_limit, remote_tool_path) = match &location.kind {
            LocationKind::Remote {
                rsync_path,
                speed_limit,
                ..
            } => (*speed_limit, rsync_path.clone()),
            LocationKind::Local { .. } => (0, None),
        };
        TransferOptions {
            dry_run: self.options.dry_run,
            verbosity: self.options.verbosity,
            bandwidth_limit,
            remote_tool_path,
        }
    }
}
