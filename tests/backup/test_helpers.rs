//! Shared fixtures and helpers for backup BDD scenarios.

use std::fmt::Write as _;
use std::fs::{create_dir_all, write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use linkback::{LocationRegistry, RunSummary, SnapshotLabel};
use rstest::fixture;
use tempfile::TempDir;

use super::test_doubles::LocalToolRunner;

/// Files seeded into every source folder.
pub const SEEDED_FILES: [&str; 2] = ["data.txt", "stable.txt"];

#[derive(Clone, Debug)]
pub struct BackupContext {
    pub root: Utf8PathBuf,
    pub sections: Vec<String>,
    pub runner: LocalToolRunner,
    pub summary: Option<RunSummary>,
    _tmp: Arc<TempDir>,
}

impl BackupContext {
    pub fn backups(&self) -> Utf8PathBuf {
        self.root.join("backups")
    }

    pub fn remote_home(&self, location: &str) -> Utf8PathBuf {
        self.root.join("remote").join(location)
    }

    pub fn local_home(&self, location: &str) -> Utf8PathBuf {
        self.root.join("local").join(location)
    }

    pub fn registry(&self) -> LocationRegistry {
        let mut document = String::new();
        writeln!(document, "[global]\nbackup_dir = \"{}\"", self.backups())
            .unwrap_or_else(|err| panic!("render document: {err}"));
        for section in &self.sections {
            writeln!(document, "\n{section}").unwrap_or_else(|err| panic!("render document: {err}"));
        }
        LocationRegistry::from_toml_str(&document)
            .unwrap_or_else(|err| panic!("scenario document should resolve: {err}"))
    }
}

#[fixture]
pub fn backup_context() -> BackupContext {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("create scenario temp dir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be UTF-8: {}", path.display()));
    BackupContext {
        root,
        sections: Vec::new(),
        runner: LocalToolRunner::new(),
        summary: None,
        _tmp: Arc::new(tmp),
    }
}

pub fn host_for(location: &str) -> String {
    format!("{location}.example.com")
}

pub fn seed_folders(home: &Utf8Path, folders: &str) {
    for folder in folders.split(',').map(str::trim) {
        let path = home.join(folder);
        create_dir_all(&path).unwrap_or_else(|err| panic!("create {path}: {err}"));
        for file in SEEDED_FILES {
            write(path.join(file), format!("{folder}/{file}\n"))
                .unwrap_or_else(|err| panic!("seed {path}/{file}: {err}"));
        }
    }
}

pub fn parse_date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .unwrap_or_else(|err| panic!("scenario date {text} should parse: {err}"))
}

/// Snapshot names under `destination` in ascending order; a missing
/// destination has none.
pub fn snapshots_in(destination: &Utf8Path) -> Vec<String> {
    let Ok(entries) = destination.read_dir_utf8() else {
        return Vec::new();
    };
    let mut labels: Vec<SnapshotLabel> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| SnapshotLabel::parse(entry.file_name()))
        .collect();
    labels.sort_unstable();
    labels.iter().map(ToString::to_string).collect()
}
