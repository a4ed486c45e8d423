//! Configuration for the external tools and the retention window.
//!
//! [`ToolConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files and `LINKBACK_*` environment variables. The error type
//! [`ConfigError`] is shared with the location registry: any configuration
//! problem aborts the run before a transfer starts.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default path of the rsync-compatible transfer tool.
pub const DEFAULT_RSYNC_BIN: &str = "/usr/bin/rsync";

/// Default path of the remote shell used for remote transfers.
pub const DEFAULT_SSH_BIN: &str = "/usr/bin/ssh";

/// Default path of the recursive hardlink copy tool.
pub const DEFAULT_CP_BIN: &str = "/bin/cp";

/// Default path of the recursive delete tool.
pub const DEFAULT_RM_BIN: &str = "/bin/rm";

/// Number of days a non-anchor snapshot is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

/// Tool paths and retention settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "LINKBACK")]
pub struct ToolConfig {
    /// Path to the `rsync` executable.
    #[ortho_config(default = DEFAULT_RSYNC_BIN.to_owned())]
    pub rsync_bin: String,
    /// Path to the `ssh` executable used as the remote shell.
    #[ortho_config(default = DEFAULT_SSH_BIN.to_owned())]
    pub ssh_bin: String,
    /// Path to the `cp` executable used for hardlinked snapshots.
    #[ortho_config(default = DEFAULT_CP_BIN.to_owned())]
    pub cp_bin: String,
    /// Path to the `rm` executable used to prune snapshots.
    #[ortho_config(default = DEFAULT_RM_BIN.to_owned())]
    pub rm_bin: String,
    /// Age in days after which snapshots become eligible for pruning.
    #[ortho_config(default = DEFAULT_RETENTION_DAYS)]
    pub retention_days: u32,
}

impl ToolConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails, or
    /// [`ConfigError::InvalidTool`] when a tool path is blank.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let config = Self::load_from_iter([std::ffi::OsString::from("linkback")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Ensures every tool path is present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTool`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_value(&self.rsync_bin, "rsync_bin")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.cp_bin, "cp_bin")?;
        Self::require_value(&self.rm_bin, "rm_bin")?;
        Ok(())
    }

    fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidTool {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}

/// Errors raised while loading or resolving configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the configuration loaders and the TOML parser.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the locations document cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a tool path is blank.
    #[error("missing {field}: set LINKBACK_{env_suffix}", env_suffix = field.to_uppercase())]
    InvalidTool {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a required section is absent.
    #[error("missing [{section}] section")]
    MissingSection {
        /// Section name.
        section: String,
    },
    /// Raised when a required key is absent from a section.
    #[error("missing {field} in [{section}]")]
    MissingField {
        /// Section name.
        section: String,
        /// Key that was expected.
        field: String,
    },
    /// Raised when a key holds a value of the wrong shape.
    #[error("invalid {field} in [{section}]: {message}")]
    InvalidValue {
        /// Section name.
        section: String,
        /// Offending key.
        field: String,
        /// Description of the problem.
        message: String,
    },
    /// Raised when splitting `folders` produces an empty name.
    #[error("empty folder name in [{location}] folders")]
    EmptyFolder {
        /// Location whose folder list is malformed.
        location: String,
    },
    /// Raised when a folder would escape its destination directory.
    #[error("folder {folder} in [{location}] must be a relative path without `..`")]
    InvalidFolder {
        /// Location that declared the folder.
        location: String,
        /// Offending folder name.
        folder: String,
    },
    /// Raised when a location lookup fails.
    #[error("unknown location {name}")]
    UnknownLocation {
        /// Requested location name.
        name: String,
    },
    /// Raised when the document declares no location sections.
    #[error("no locations configured")]
    NoLocations,
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
