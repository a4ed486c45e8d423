//! BDD step definitions for the backup cycle.

use std::fs::{create_dir_all, metadata, write};
use std::os::unix::fs::MetadataExt;

use camino::Utf8Path;
use linkback::test_support::tool_config;
use linkback::{BackupError, BackupOrchestrator, LocationReport, RunOptions, TransferError};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    BackupContext, host_for, parse_date, seed_folders, snapshots_in,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn inode(path: &Utf8Path) -> Result<u64, StepError> {
    metadata(path)
        .map(|meta| meta.ino())
        .map_err(|err| StepError::Assertion(format!("stat {path}: {err}")))
}

fn report<'a>(context: &'a BackupContext, name: &str) -> Result<&'a LocationReport, StepError> {
    let Some(summary) = context.summary.as_ref() else {
        return Err(StepError::Assertion(String::from("backup has not run")));
    };
    summary
        .reports
        .iter()
        .find(|report| report.location == name)
        .ok_or_else(|| StepError::Assertion(format!("no report for location {name}")))
}

fn run_backup(mut backup_context: BackupContext, date: &str, dry_run: bool) -> BackupContext {
    let options = RunOptions {
        dry_run,
        verbosity: 0,
    };
    let orchestrator = BackupOrchestrator::new(
        backup_context.registry(),
        &tool_config(),
        options,
        backup_context.runner.clone(),
    );
    backup_context.summary = Some(orchestrator.run(parse_date(date)));
    backup_context
}

#[given("a remote location \"{name}\" with folders \"{folders}\"")]
fn remote_location(
    mut backup_context: BackupContext,
    name: String,
    folders: String,
) -> BackupContext {
    let home = backup_context.remote_home(&name);
    seed_folders(&home, &folders);
    backup_context.sections.push(format!(
        "[{name}]\nhost = \"{}\"\nhome = \"{home}\"\nfolders = \"{folders}\"\nspeed = 0",
        host_for(&name)
    ));
    backup_context
}

#[given("a local location \"{name}\" with folders \"{folders}\"")]
fn local_location(
    mut backup_context: BackupContext,
    name: String,
    folders: String,
) -> BackupContext {
    let home = backup_context.local_home(&name);
    seed_folders(&home, &folders);
    backup_context.sections.push(format!(
        "[{name}]\ntype = \"local\"\nhome = \"{home}\"\nfolders = \"{folders}\""
    ));
    backup_context
}

#[given("\"{path}\" already holds snapshots \"{labels}\"")]
fn existing_snapshots(backup_context: BackupContext, path: String, labels: String) -> BackupContext {
    let destination = backup_context.backups().join(path);
    for label in labels.split(',') {
        let snapshot = destination.join(label.trim());
        create_dir_all(&snapshot).unwrap_or_else(|err| panic!("create {snapshot}: {err}"));
    }
    backup_context
}

#[given("the transfer tool fails with status {status} for \"{name}\"")]
fn failing_transfer(backup_context: BackupContext, status: i32, name: String) -> BackupContext {
    backup_context.runner.fail_host(&host_for(&name), status);
    backup_context
}

#[when("the backup runs on \"{date}\"")]
fn backup_runs(backup_context: BackupContext, date: String) -> BackupContext {
    run_backup(backup_context, &date, false)
}

#[when("a dry run runs on \"{date}\"")]
fn dry_run_runs(backup_context: BackupContext, date: String) -> BackupContext {
    run_backup(backup_context, &date, true)
}

#[when("\"{file}\" of \"{path}\" changes at the source")]
fn source_changes(backup_context: BackupContext, file: String, path: String) -> BackupContext {
    let Some((location, folder)) = path.split_once('/') else {
        panic!("path {path} should be <location>/<folder>");
    };
    let source = backup_context.remote_home(location).join(folder).join(&file);
    write(&source, "changed\n").unwrap_or_else(|err| panic!("modify {source}: {err}"));
    backup_context
}

#[then("the location \"{name}\" succeeds")]
fn location_succeeds(backup_context: &BackupContext, name: String) -> Result<(), StepError> {
    let location = report(backup_context, &name)?;
    if location.is_success() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {name} to succeed, got {location:?}"
        )))
    }
}

#[then("the location \"{name}\" fails with transfer status {status}")]
fn location_fails(
    backup_context: &BackupContext,
    name: String,
    status: i32,
) -> Result<(), StepError> {
    let location = report(backup_context, &name)?;
    let failures: Vec<_> = location.failures().collect();
    match failures.as_slice() {
        [(_, BackupError::Transfer(TransferError::Failed { status: actual, .. }))]
            if *actual == Some(status) && location.folders.len() == 1 =>
        {
            Ok(())
        }
        _ => Err(StepError::Assertion(format!(
            "expected a single transfer failure with status {status}, got {location:?}"
        ))),
    }
}

#[then("\"{path}\" holds snapshots \"{labels}\"")]
fn holds_snapshots(
    backup_context: &BackupContext,
    path: String,
    labels: String,
) -> Result<(), StepError> {
    let actual = snapshots_in(&backup_context.backups().join(&path)).join(",");
    if actual == labels {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {path} to hold {labels}, found {actual}"
        )))
    }
}

#[then("no snapshots exist for \"{path}\"")]
fn no_snapshots(backup_context: &BackupContext, path: String) -> Result<(), StepError> {
    let actual = snapshots_in(&backup_context.backups().join(&path));
    if actual.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no snapshots in {path}, found {actual:?}"
        )))
    }
}

#[then("the transfer tool was not invoked")]
fn transfer_not_invoked(backup_context: &BackupContext) -> Result<(), StepError> {
    let programs = backup_context.runner.programs();
    if programs.iter().any(|program| program == "rsync") {
        Err(StepError::Assertion(format!(
            "rsync should not run, invoked {programs:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("\"{file}\" is shared by the current mirror and snapshot \"{label}\" of \"{path}\"")]
fn mirror_shared_with_snapshot(
    backup_context: &BackupContext,
    file: String,
    label: String,
    path: String,
) -> Result<(), StepError> {
    let destination = backup_context.backups().join(&path);
    let mirrored = inode(&destination.join("current").join(&file))?;
    let snapshotted = inode(&destination.join(&label).join(&file))?;
    if mirrored == snapshotted {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{file} in {path}/{label} is not a hardlink of the current mirror"
        )))
    }
}

#[then("\"{file}\" is shared by the source of \"{path}\" and snapshot \"{label}\"")]
fn source_shared_with_snapshot(
    backup_context: &BackupContext,
    file: String,
    path: String,
    label: String,
) -> Result<(), StepError> {
    let Some((location, folder)) = path.split_once('/') else {
        return Err(StepError::Assertion(format!(
            "path {path} should be <location>/<folder>"
        )));
    };
    let source = inode(&backup_context.local_home(location).join(folder).join(&file))?;
    let snapshotted = inode(&backup_context.backups().join(&path).join(&label).join(&file))?;
    if source == snapshotted {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{file} in {path}/{label} is not a hardlink of the source"
        )))
    }
}

#[then("\"{file}\" is shared by snapshots \"{first}\" and \"{second}\" of \"{path}\"")]
fn shared_between_snapshots(
    backup_context: &BackupContext,
    file: String,
    first: String,
    second: String,
    path: String,
) -> Result<(), StepError> {
    let destination = backup_context.backups().join(&path);
    let older = inode(&destination.join(&first).join(&file))?;
    let newer = inode(&destination.join(&second).join(&file))?;
    if older == newer {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{file} should be shared by {first} and {second}"
        )))
    }
}

#[then("\"{file}\" differs between snapshots \"{first}\" and \"{second}\" of \"{path}\"")]
fn differs_between_snapshots(
    backup_context: &BackupContext,
    file: String,
    first: String,
    second: String,
    path: String,
) -> Result<(), StepError> {
    let destination = backup_context.backups().join(&path);
    let older = inode(&destination.join(&first).join(&file))?;
    let newer = inode(&destination.join(&second).join(&file))?;
    if older == newer {
        return Err(StepError::Assertion(format!(
            "{file} should have a new copy in {second}"
        )));
    }
    let previous = std::fs::read_to_string(destination.join(&first).join(&file))
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    if previous == "changed\n" {
        Err(StepError::Assertion(format!(
            "{first} should keep the content it was taken with"
        )))
    } else {
        Ok(())
    }
}
