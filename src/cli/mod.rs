//! Command-line interface definitions for the `linkback` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};

/// Top-level CLI for the `linkback` binary.
#[derive(Debug, Parser)]
#[command(
    name = "linkback",
    version,
    about = "Mirror configured locations and keep hardlinked daily snapshots",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Locations document describing the backup root and every location.
    #[arg(value_name = "CONFIG")]
    pub(crate) config: Utf8PathBuf,
    /// Show what would be transferred without creating or deleting snapshots.
    #[arg(short = 'n', long)]
    pub(crate) dry_run: bool,
    /// Increase verbosity; repeat for more detail.
    ///
    /// The level is passed to the transfer tool and also raises the log
    /// level when `RUST_LOG` is not set.
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}
