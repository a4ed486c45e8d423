//! Read-only view over the locations document.
//!
//! The document is a set of TOML sections: the reserved `[global]` section
//! holds `backup_dir`, and every other section describes one location. All
//! sections are resolved when the registry is built so configuration errors
//! surface before any transfer starts.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;

use crate::config::ConfigError;

mod types;

pub use types::{Endpoint, GlobalSettings, Location, LocationKind, with_trailing_slash};

/// Name of the reserved section holding global settings.
pub const GLOBAL_SECTION: &str = "global";

/// Value of `type` that selects a local location.
const LOCAL_TYPE: &str = "local";

#[derive(Debug, Deserialize)]
struct GlobalSection {
    #[serde(alias = "backupdir", alias = "backupDir")]
    backup_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeedValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct LocationSection {
    folders: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    host: Option<String>,
    home: Option<String>,
    speed: Option<SpeedValue>,
    rsync: Option<String>,
}

/// Configured locations plus the global settings they share.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocationRegistry {
    global: GlobalSettings,
    locations: Vec<Location>,
}

impl LocationRegistry {
    /// Reads and resolves the locations document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, or any
    /// resolution error from [`LocationRegistry::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let io_error = |err: std::io::Error| ConfigError::Io {
            path: path.to_string(),
            message: err.to_string(),
        };
        let parent = match path.parent() {
            Some(dir) if !dir.as_str().is_empty() => dir,
            _ => Utf8Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| ConfigError::Io {
            path: path.to_string(),
            message: String::from("path does not name a file"),
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
        let contents = dir.read_to_string(file_name).map_err(io_error)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and resolves a locations document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is not valid TOML, the
    /// `[global]` section or a required key is missing, a value is malformed,
    /// or no location sections are present.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let document: toml::Table =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let mut global = None;
        let mut locations = Vec::new();
        for (name, value) in document {
            if name == GLOBAL_SECTION {
                global = Some(resolve_global(value)?);
            } else {
                locations.push(resolve_location(name, value)?);
            }
        }

        let global = global.ok_or_else(|| ConfigError::MissingSection {
            section: GLOBAL_SECTION.to_owned(),
        })?;
        if locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }
        Ok(Self { global, locations })
    }

    /// Returns the global settings.
    #[must_use]
    pub const fn global(&self) -> &GlobalSettings {
        &self.global
    }

    /// Returns every configured location in document order.
    #[must_use]
    pub fn list_locations(&self) -> &[Location] {
        &self.locations
    }

    /// Looks up a location by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLocation`] when no section has that name.
    pub fn location(&self, name: &str) -> Result<&Location, ConfigError> {
        self.locations
            .iter()
            .find(|location| location.name == name)
            .ok_or_else(|| ConfigError::UnknownLocation {
                name: name.to_owned(),
            })
    }

    /// Returns the ordered folder list of a location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLocation`] when no section has that name.
    pub fn folders_of(&self, name: &str) -> Result<&[String], ConfigError> {
        self.location(name).map(|location| location.folders.as_slice())
    }

    /// Destination directory for `folder` of `location` under the backup root.
    #[must_use]
    pub fn destination(&self, location: &Location, folder: &str) -> Utf8PathBuf {
        self.global.backup_dir.join(&location.name).join(folder)
    }
}

fn resolve_global(value: toml::Value) -> Result<GlobalSettings, ConfigError> {
    let section: GlobalSection = value
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::InvalidValue {
            section: GLOBAL_SECTION.to_owned(),
            field: String::from("backup_dir"),
            message: err.to_string(),
        })?;
    let backup_dir = required(section.backup_dir, GLOBAL_SECTION, "backup_dir")?;
    Ok(GlobalSettings {
        backup_dir: Utf8PathBuf::from(backup_dir),
    })
}

fn resolve_location(name: String, value: toml::Value) -> Result<Location, ConfigError> {
    validate_location_name(&name)?;
    let section: LocationSection =
        value
            .try_into()
            .map_err(|err: toml::de::Error| ConfigError::InvalidValue {
                section: name.clone(),
                field: String::from("section"),
                message: err.to_string(),
            })?;

    let raw_folders = present(section.folders, &name, "folders")?;
    let folders = split_folders(&name, &raw_folders)?;
    let home = Utf8PathBuf::from(required(section.home, &name, "home")?);

    let kind = if section.kind.as_deref() == Some(LOCAL_TYPE) {
        LocationKind::Local { home }
    } else {
        LocationKind::Remote {
            host: required(section.host, &name, "host")?,
            home,
            rsync_path: section.rsync.filter(|path| !path.trim().is_empty()),
            speed_limit: parse_speed(&name, section.speed)?,
        }
    };

    Ok(Location {
        name,
        kind,
        folders,
    })
}

/// Location names become a directory under the backup root, so they must
/// be a single plain path component.
fn validate_location_name(name: &str) -> Result<(), ConfigError> {
    let mut components = Utf8Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(component)), None) if component == name => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            section: name.to_owned(),
            field: String::from("section"),
            message: String::from("location name must be a single directory name"),
        }),
    }
}

/// Returns the value untouched, treating a blank value as absent.
fn present(value: Option<String>, section: &str, field: &str) -> Result<String, ConfigError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ConfigError::MissingField {
            section: section.to_owned(),
            field: field.to_owned(),
        }),
    }
}

fn required(value: Option<String>, section: &str, field: &str) -> Result<String, ConfigError> {
    present(value, section, field).map(|text| text.trim().to_owned())
}

fn parse_speed(section: &str, speed: Option<SpeedValue>) -> Result<u32, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        section: section.to_owned(),
        field: String::from("speed"),
        message,
    };
    match speed {
        None => Ok(0),
        Some(SpeedValue::Number(value)) => {
            u32::try_from(value).map_err(|err| invalid(format!("{value}: {err}")))
        }
        Some(SpeedValue::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(SpeedValue::Text(text)) => text
            .trim()
            .parse::<u32>()
            .map_err(|err| invalid(format!("{text}: {err}"))),
    }
}

fn is_folder_delimiter(ch: char) -> bool {
    ch.is_whitespace() || ch == ',' || ch == ':'
}

/// Splits a `folders` value on runs of whitespace, commas, or colons.
///
/// A delimiter at either end would produce an empty folder name and is
/// rejected, as are absolute paths and `..` components.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyFolder`] or [`ConfigError::InvalidFolder`].
pub fn split_folders(location: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let starts_or_ends_with_delimiter = raw.starts_with(is_folder_delimiter)
        || raw.ends_with(is_folder_delimiter);
    if raw.is_empty() || starts_or_ends_with_delimiter {
        return Err(ConfigError::EmptyFolder {
            location: location.to_owned(),
        });
    }

    raw.split(is_folder_delimiter)
        .filter(|folder| !folder.is_empty())
        .map(|folder| validate_folder(location, folder))
        .collect()
}

fn validate_folder(location: &str, folder: &str) -> Result<String, ConfigError> {
    let escapes = Utf8Path::new(folder)
        .components()
        .any(|component| !matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir));
    if escapes {
        return Err(ConfigError::InvalidFolder {
            location: location.to_owned(),
            folder: folder.to_owned(),
        });
    }
    Ok(folder.to_owned())
}
