//! Deterministic construction of rsync invocations.

use std::ffi::OsString;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;

use crate::config::ToolConfig;
use crate::registry::{Endpoint, with_trailing_slash};

use super::TransferError;

/// Name of the live mirror directory inside every remote destination.
pub const CURRENT_DIR: &str = "current";

/// Per-transfer switches derived from the run options and the location.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferOptions {
    /// Simulate the transfer without changing the destination.
    pub dry_run: bool,
    /// Number of `-v` letters passed to rsync.
    pub verbosity: u8,
    /// Bandwidth cap in rsync units; zero means unlimited.
    pub bandwidth_limit: u32,
    /// Alternative rsync binary on the remote host.
    pub remote_tool_path: Option<String>,
}

/// A fully ordered program plus argument list. Never mutated once built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    /// Creates an invocation from a program and its arguments.
    #[must_use]
    pub const fn new(program: String, args: Vec<OsString>) -> Self {
        Self { program, args }
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Renders a shell-escaped command line for logs and failure reports.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(escape(self.program.as_str().into()).into_owned());
        parts.extend(self.args.iter().map(|arg| {
            let text = arg.to_string_lossy();
            escape(text).into_owned()
        }));
        parts.join(" ")
    }
}

/// Builds rsync invocations using the configured tool paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandBuilder {
    rsync_bin: String,
    ssh_bin: String,
}

impl CommandBuilder {
    /// Creates a builder from the configured tool paths.
    #[must_use]
    pub fn new(tools: &ToolConfig) -> Self {
        Self {
            rsync_bin: tools.rsync_bin.clone(),
            ssh_bin: tools.ssh_bin.clone(),
        }
    }

    /// Ensures `destination/current` exists and returns the invocation that
    /// mirrors `source` into it.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Filesystem`] when the `current/` directory
    /// cannot be created.
    pub fn build(
        &self,
        source: &Endpoint,
        destination: &Utf8Path,
        options: &TransferOptions,
    ) -> Result<Invocation, TransferError> {
        let current = destination.join(CURRENT_DIR);
        Dir::create_ambient_dir_all(&current, ambient_authority()).map_err(|err| {
            TransferError::Filesystem {
                path: current.clone(),
                message: err.to_string(),
            }
        })?;
        Ok(self.arguments(source, destination, options))
    }

    /// Returns the invocation for mirroring `source` into
    /// `destination/current` without touching the filesystem.
    #[must_use]
    pub fn arguments(
        &self,
        source: &Endpoint,
        destination: &Utf8Path,
        options: &TransferOptions,
    ) -> Invocation {
        let mut args = vec![
            OsString::from("-az"),
            OsString::from("--delete"),
            OsString::from("--no-perms"),
            OsString::from("--no-owner"),
            OsString::from("--no-group"),
        ];

        if options.dry_run {
            args.push(OsString::from("--dry-run"));
        }

        if options.verbosity > 0 {
            let letters = "v".repeat(usize::from(options.verbosity));
            args.push(OsString::from(format!("-{letters}")));
        }

        if let Some(ref path) = options.remote_tool_path {
            args.push(OsString::from(format!("--rsync-path={path}")));
        }

        if options.bandwidth_limit > 0 {
            args.push(OsString::from(format!(
                "--bwlimit={}",
                options.bandwidth_limit
            )));
        }

        if source.is_remote() {
            args.push(OsString::from("--rsh"));
            args.push(OsString::from(&self.ssh_bin));
        }

        args.push(OsString::from(source.as_directory_argument()));
        args.push(OsString::from(with_trailing_slash(
            &destination.join(CURRENT_DIR),
        )));

        Invocation::new(self.rsync_bin.clone(), args)
    }
}
