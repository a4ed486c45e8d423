//! rsync invocation building and outcome classification.
//!
//! The command builder turns a source endpoint and a destination directory
//! into an [`Invocation`]; the executor runs it through a
//! [`CommandRunner`](crate::process::CommandRunner), drops benign noise from
//! stdout and classifies the exit status.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

mod command;
mod executor;

pub use command::{CURRENT_DIR, CommandBuilder, Invocation, TransferOptions};
pub use executor::{TransferExecutor, TransferOutcome, filter_benign_lines};

/// Errors surfaced while preparing or running a transfer.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransferError {
    /// Raised when the transfer tool cannot be started.
    #[error(transparent)]
    Spawn(#[from] ProcessError),
    /// Raised when the destination's `current/` directory cannot be created.
    #[error("failed to create {path}: {message}")]
    Filesystem {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the transfer tool exits with a non-benign status.
    #[error("{command} exited with status {status_text}: {stderr}")]
    Failed {
        /// Rendered command line of the failed invocation.
        command: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Unfiltered stdout captured from the process.
        stdout: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}
