//! Core library for the linkback incremental backup tool.
//!
//! The crate mirrors configured locations into a backup store with rsync,
//! keeps a hardlinked snapshot per day and prunes snapshots that fall out of
//! the retention window, keeping the first of every month. External tools
//! are reached through the [`CommandRunner`] seam so the engine can be
//! driven by test doubles.

pub mod backup;
pub mod config;
pub mod process;
pub mod registry;
pub mod retention;
pub mod snapshot;
pub mod test_support;
pub mod transfer;

pub use backup::{
    BackupError, BackupOrchestrator, CancellationFlag, FolderReport, FolderSummary,
    LocationReport, RunOptions, RunSummary,
};
pub use config::{ConfigError, ToolConfig};
pub use process::{CommandOutput, CommandRunner, ProcessCommandRunner, ProcessError};
pub use registry::{Endpoint, GlobalSettings, Location, LocationKind, LocationRegistry};
pub use retention::{RetentionEnforcer, RetentionError, RetentionPlan, RetentionPolicy};
pub use snapshot::{SnapshotError, SnapshotLabel, SnapshotManager};
pub use transfer::{
    CommandBuilder, Invocation, TransferError, TransferExecutor, TransferOptions, TransferOutcome,
};
