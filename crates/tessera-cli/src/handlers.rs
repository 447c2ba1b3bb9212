use std::fs::canonicalize;
use std::io::{Write as _, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tessera_core::Config;
use tessera_exec::{CancelHandle, SecureExecutor, TimeoutTable, cancellation};
use tessera_orchestrator::{Pipeline, RunReport, merge_profiles};
use tokio::signal::ctrl_c;
use tokio::spawn;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, CoverageCommand};

/// Dispatch a parsed command line.
///
/// # Errors
/// Any planning, execution or aggregated module failure.
pub async fn run(cli: Cli) -> Result<()> {
    let root = canonicalize(&cli.root)
        .with_context(|| format!("workspace root {} not found", cli.root.display()))?;

    let config = Config::load(&root).context("failed to load configuration")?;
    let (handle, signal) = cancellation();
    cancel_on_interrupt(handle);
    let executor = SecureExecutor::new(TimeoutTable::from_config(&config.timeouts))
        .with_cancel_signal(signal)
        .with_dry_run(cli.dry_run);
    let pipeline = Pipeline::new(root, config, Arc::new(executor));

    match cli.command {
        Commands::Test { mode, extra } => finish(pipeline.test(mode, &extra).await?),
        Commands::Build => finish(pipeline.build().await?),
        Commands::Vet => finish(pipeline.vet().await?),
        Commands::Lint => finish(pipeline.lint().await?),
        Commands::Modules => handle_modules(&pipeline).await,
        Commands::Tags => handle_tags(&pipeline).await,
        Commands::Coverage { action } => match action {
            CoverageCommand::Merge { files, output } => handle_merge(&files, &output),
            CoverageCommand::Report { html } => Ok(pipeline.coverage_report(html).await?),
        },
    }
}

/// Cancels running commands on the first Ctrl-C.
fn cancel_on_interrupt(handle: CancelHandle) {
    spawn(async move {
        if ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling running commands");
            handle.cancel();
        }
    });
}

fn finish(report: RunReport) -> Result<()> {
    let report = report.into_result()?;
    info!("All {} module(s) passed", report.total_modules);
    Ok(())
}

fn handle_merge(files: &[PathBuf], output: &Path) -> Result<()> {
    merge_profiles(files, output)?;
    info!("Merged {} profile(s) into {}", files.len(), output.display());
    Ok(())
}

async fn handle_modules(pipeline: &Pipeline) -> Result<()> {
    let plan = pipeline.plan().await?;
    for failure in &plan.discovery_errors {
        warn!("{}: {}", failure.module.location(), failure.error);
    }
    let mut out = stdout().lock();
    write!(out, "{}", plan.resolution.summary())?;
    Ok(())
}

async fn handle_tags(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.discover_tags().await;
    let mut out = stdout().lock();
    for tag in &report.tags {
        writeln!(out, "{tag}")?;
    }
    Ok(())
}
