//! BDD scenarios for the backup cycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BackupContext, backup_context};

#[scenario(
    path = "tests/features/backup.feature",
    name = "Mirror a remote folder and snapshot it"
)]
fn scenario_mirror_and_snapshot(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Unchanged files are shared between daily snapshots"
)]
fn scenario_unchanged_files_shared(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Expired snapshots are pruned"
)]
fn scenario_prune_expired(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "A failed transfer skips the rest of the location"
)]
fn scenario_transfer_failure(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Local folders are linked without a transfer"
)]
fn scenario_local_location(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "A dry run leaves the store untouched"
)]
fn scenario_dry_run(backup_context: BackupContext) {
    let _ = backup_context;
}
