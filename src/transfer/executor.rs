//! Runs transfer invocations and classifies their exit status.

use tracing::debug;

use crate::process::{CommandOutput, CommandRunner};

use super::{Invocation, TransferError};

/// Highest exit status rsync uses for benign outcomes such as skipped files.
const HIGHEST_BENIGN_STATUS: i32 = 1;

/// Classified result of a transfer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferOutcome {
    /// The transfer completed.
    Success {
        /// Stdout with benign lines removed.
        output: String,
    },
    /// The transfer completed but reported diagnostics on stderr.
    SuccessWithWarnings {
        /// Stdout with benign lines removed.
        output: String,
        /// Stderr reported by the tool.
        warnings: String,
    },
    /// The transfer failed.
    Failure {
        /// Exit status, if the process exited normally.
        status: Option<i32>,
        /// Unfiltered stdout.
        stdout: String,
        /// Stderr.
        stderr: String,
    },
}

impl TransferOutcome {
    /// Returns `true` for both success variants.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// Converts a failure into [`TransferError::Failed`] attributed to
    /// `invocation`, passing successful outcomes through.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Failed`] for [`TransferOutcome::Failure`].
    pub fn into_result(self, invocation: &Invocation) -> Result<Self, TransferError> {
        match self {
            Self::Failure {
                status,
                stdout,
                stderr,
            } => Err(TransferError::Failed {
                command: invocation.command_line(),
                status,
                status_text: status
                    .map_or_else(|| String::from("unknown"), |code| code.to_string()),
                stdout,
                stderr,
            }),
            outcome => Ok(outcome),
        }
    }
}

/// Returns `true` for lines that only report an already up-to-date file.
fn is_benign_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.ends_with(" is uptodate") || trimmed.contains("already up to date")
}

/// Drops lines reporting already up-to-date files, keeping the rest in order.
#[must_use]
pub fn filter_benign_lines(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !is_benign_line(line))
        .fold(String::new(), |mut acc, line| {
            acc.push_str(line);
            acc.push('\n');
            acc
        })
}

/// Runs invocations through a [`CommandRunner`] and classifies the result.
#[derive(Clone, Debug)]
pub struct TransferExecutor<R: CommandRunner> {
    runner: R,
    verbosity: u8,
}

impl<R: CommandRunner> TransferExecutor<R> {
    /// Creates an executor. `verbosity` decides whether stderr on a
    /// successful transfer is surfaced as a warning.
    #[must_use]
    pub const fn new(runner: R, verbosity: u8) -> Self {
        Self { runner, verbosity }
    }

    /// Runs `invocation` to completion and classifies its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Spawn`] when the tool cannot be started.
    /// Non-zero exit statuses are reported through [`TransferOutcome`].
    pub fn execute(&self, invocation: &Invocation) -> Result<TransferOutcome, TransferError> {
        debug!(command = %invocation.command_line(), "running transfer");
        let output = self.runner.run(invocation.program(), invocation.args())?;
        Ok(self.classify(output))
    }

    fn classify(&self, output: CommandOutput) -> TransferOutcome {
        let benign = output
            .code
            .is_some_and(|code| (0..=HIGHEST_BENIGN_STATUS).contains(&code));
        if !benign {
            return TransferOutcome::Failure {
                status: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            };
        }

        let filtered = filter_benign_lines(&output.stdout);
        if self.verbosity > 0 && !output.stderr.trim().is_empty() {
            TransferOutcome::SuccessWithWarnings {
                output: filtered,
                warnings: output.stderr,
            }
        } else {
            TransferOutcome::Success { output: filtered }
        }
    }
}
