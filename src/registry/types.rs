//! Location and endpoint types resolved from the locations document.

use camino::{Utf8Path, Utf8PathBuf};

/// Settings shared by every location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalSettings {
    /// Root directory holding one subdirectory per location.
    pub backup_dir: Utf8PathBuf,
}

/// How a location is reached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LocationKind {
    /// Folders live on another host and are mirrored with rsync over SSH.
    Remote {
        /// Host name passed to the remote shell.
        host: String,
        /// Base directory on the remote host.
        home: Utf8PathBuf,
        /// Alternative rsync binary on the remote host.
        rsync_path: Option<String>,
        /// Bandwidth cap passed to rsync; zero means unlimited.
        speed_limit: u32,
    },
    /// Folders live on this machine and are snapshotted directly.
    Local {
        /// Base directory holding the folders.
        home: Utf8PathBuf,
    },
}

/// A named backup source with its ordered folder list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    /// Section name, unique within the registry.
    pub name: String,
    /// Transport details.
    pub kind: LocationKind,
    /// Folders relative to the location's home, in configured order.
    pub folders: Vec<String>,
}

impl Location {
    /// Returns `true` for locations reached over the remote shell.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.kind, LocationKind::Remote { .. })
    }

    /// Base directory holding the folders.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        match &self.kind {
            LocationKind::Remote { home, .. } | LocationKind::Local { home } => home,
        }
    }

    /// Resolves where `folder` is read from.
    #[must_use]
    pub fn source_for(&self, folder: &str) -> Endpoint {
        match &self.kind {
            LocationKind::Remote { host, home, .. } => Endpoint::Remote {
                host: host.clone(),
                path: home.join(folder),
            },
            LocationKind::Local { home } => Endpoint::Local(home.join(folder)),
        }
    }
}

/// One side of a transfer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    /// A path on this machine.
    Local(Utf8PathBuf),
    /// A path on another host, reached through the remote shell.
    Remote {
        /// Host name.
        host: String,
        /// Path on that host.
        path: Utf8PathBuf,
    },
}

impl Endpoint {
    /// Returns `true` when the endpoint needs the remote shell.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The path component of the endpoint.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Local(path) | Self::Remote { path, .. } => path,
        }
    }

    /// Renders the endpoint with exactly one trailing slash so rsync copies
    /// the directory contents rather than the directory itself.
    #[must_use]
    pub fn as_directory_argument(&self) -> String {
        let path = with_trailing_slash(self.path());
        match self {
            Self::Local(_) => path,
            Self::Remote { host, .. } => format!("{host}:{path}"),
        }
    }
}

/// Appends a single `/` to `path`, collapsing any trailing slashes already
/// present.
#[must_use]
pub fn with_trailing_slash(path: &Utf8Path) -> String {
    let trimmed = path.as_str().trim_end_matches('/');
    format!("{trimmed}/")
}
