//! Binary entry point for the linkback CLI.

use std::io::{self, Write};
use std::process;

use chrono::Local;
use clap::Parser;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use linkback::{
    BackupError, BackupOrchestrator, CancellationFlag, ConfigError, LocationRegistry,
    LocationReport, ProcessCommandRunner, RunOptions, RunSummary, ToolConfig, TransferError,
};

mod cli;

use cli::Cli;

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("backup worker stopped unexpectedly: {0}")]
    Worker(#[from] JoinError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(summary) => {
            write_summary(io::stdout(), io::stderr(), &summary);
            exit_code_for(&summary)
        }
        Err(err) => {
            write_error(io::stderr(), &err);
            EXIT_FAILURE
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<RunSummary, CliError> {
    let tools = ToolConfig::load_without_cli_args()?;
    let registry = LocationRegistry::load(&cli.config)?;
    let options = RunOptions {
        dry_run: cli.dry_run,
        verbosity: cli.verbose,
    };

    let cancellation = CancellationFlag::new();
    let listener = tokio::spawn(watch_for_interrupt(cancellation.clone()));
    let orchestrator = BackupOrchestrator::new(registry, &tools, options, ProcessCommandRunner)
        .with_cancellation(cancellation);
    let today = Local::now().date_naive();

    let summary = tokio::task::spawn_blocking(move || orchestrator.run(today)).await;
    listener.abort();
    summary.map_err(CliError::from)
}

async fn watch_for_interrupt(cancellation: CancellationFlag) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, stopping after the current step");
            cancellation.cancel();
        }
        Err(err) => warn!(error = %err, "failed to listen for interrupts"),
    }
}

fn exit_code_for(summary: &RunSummary) -> i32 {
    if summary.was_cancelled() {
        EXIT_INTERRUPTED
    } else if summary.is_success() {
        0
    } else {
        EXIT_FAILURE
    }
}

fn write_summary(mut out: impl Write, mut err: impl Write, summary: &RunSummary) {
    for report in &summary.reports {
        if report.is_success() {
            writeln!(out, "{}: backup complete", report.location).ok();
        }
        write_warnings(&mut err, report);
        write_failures(&mut err, report);
        if report.cancelled {
            writeln!(err, "{}: cancelled", report.location).ok();
        }
    }
}

fn write_warnings(target: &mut impl Write, report: &LocationReport) {
    for folder in &report.folders {
        if let Ok(summary) = &folder.result
            && let Some(warnings) = &summary.warnings
        {
            writeln!(
                target,
                "{}: {}: transfer warnings:\n{}",
                report.location,
                folder.folder,
                warnings.trim_end()
            )
            .ok();
        }
    }
}

fn write_failures(target: &mut impl Write, report: &LocationReport) {
    for (folder, error) in report.failures() {
        writeln!(target, "{}: {folder}: {error}", report.location).ok();
        if let BackupError::Transfer(TransferError::Failed {
            status_text,
            stdout,
            stderr,
            ..
        }) = error
        {
            writeln!(target, "  exit status: {status_text}").ok();
            writeln!(target, "  stderr: {}", stderr.trim_end()).ok();
            writeln!(target, "  stdout: {}", stdout.trim_end()).ok();
        }
    }
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
