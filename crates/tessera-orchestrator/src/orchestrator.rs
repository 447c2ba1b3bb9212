use std::mem::take;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_core::{Config, Module, ModuleError, Result, aggregate, format_duration};
use tessera_exec::{CommandSpec, Executor};
use tokio::fs::rename;
use tracing::{error, info, warn};

use crate::args::{ALL_PACKAGES, build_test_args};
use crate::coverage::{finalize_profiles, profile_file_name};
use crate::mode::RunMode;

/// Outcome of one command in one module.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Module the command ran in.
    pub module: Module,
    /// Build tag of the sweep, `None` for the baseline.
    pub tag: Option<String>,
    /// Whether the command exited successfully.
    pub success: bool,
    /// Wall-clock time spent.
    pub duration: Duration,
    /// Profile holding this run's coverage once the sweep is finalized: the
    /// sweep's canonical `coverage.txt` or `coverage_<tag>.txt`.
    pub coverage_profile: Option<PathBuf>,
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every command passed.
    Succeeded,
    /// At least one module failed.
    PartiallyFailed,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per module and tag outcomes, in execution order.
    pub results: Vec<ExecutionResult>,
    /// Collected failures, in execution order.
    pub failures: Vec<ModuleError>,
    /// Number of modules the run covered.
    pub total_modules: usize,
    /// Canonical coverage profiles written by the run.
    pub profiles: Vec<PathBuf>,
    /// Tag sweeps that were not attempted after an earlier sweep failed.
    pub skipped_tags: Vec<String>,
}

impl RunReport {
    /// Whether the run passed.
    pub fn status(&self) -> RunStatus {
        if self.failures.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::PartiallyFailed
        }
    }

    /// The report, or the aggregated error when any module failed.
    ///
    /// # Errors
    /// Returns [`tessera_core::Error::ModuleFailures`] listing every failure.
    pub fn into_result(mut self) -> Result<Self> {
        let failures = take(&mut self.failures);
        match aggregate(failures, self.total_modules) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs toolchain commands across modules in dependency order.
#[derive(Clone)]
pub struct TestOrchestrator {
    executor: Arc<dyn Executor>,
    config: Config,
    root: PathBuf,
}

impl TestOrchestrator {
    /// Orchestrator for the workspace at `root`.
    pub fn new(executor: Arc<dyn Executor>, config: Config, root: PathBuf) -> Self {
        Self {
            executor,
            config,
            root,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drops modules whose name is listed in `test.exclude_modules`.
    pub fn filter_modules(&self, modules: &[Module], operation: &str) -> Vec<Module> {
        let excluded = &self.config.test.exclude_modules;
        modules
            .iter()
            .filter(|module| {
                let skip = excluded.contains(&module.name);
                if skip {
                    info!("Skipping module {} (excluded from {operation})", module.name);
                }
                !skip
            })
            .cloned()
            .collect()
    }

    /// Runs the baseline sweep and then one sweep per tag.
    ///
    /// Modules run in the given order and tags in the given order. Per-module
    /// failures are collected into the report. In modes that stop on failure,
    /// a failed sweep skips the remaining tags.
    ///
    /// # Errors
    /// Returns immediately on a fatal error such as cancellation.
    pub async fn run_tests(
        &self,
        modules: &[Module],
        tags: &[String],
        mode: RunMode,
        extra_args: &[String],
    ) -> Result<RunReport> {
        let operation = format!("{mode} tests");
        let modules = self.filter_modules(modules, &operation);
        let mut report = RunReport {
            total_modules: modules.len(),
            ..RunReport::default()
        };
        if modules.is_empty() {
            warn!("No modules to test after exclusions");
            return Ok(report);
        }

        let sweeps: Vec<Option<&str>> = [None]
            .into_iter()
            .chain(tags.iter().map(|tag| Some(tag.as_str())))
            .collect();
        for (index, tag) in sweeps.iter().enumerate() {
            match tag {
                Some(name) => info!("Running {operation} with build tag: {name}"),
                None if tags.is_empty() => info!("Running {operation}"),
                None => info!("Running {operation} without build tags"),
            }
            let passed = self.run_sweep(&modules, *tag, mode, extra_args, &mut report).await?;
            if !passed && mode.stops_on_failure() {
                report.skipped_tags = sweeps[index + 1..]
                    .iter()
                    .flatten()
                    .map(|name| (*name).to_owned())
                    .collect();
                if !report.skipped_tags.is_empty() {
                    warn!(
                        "Skipping {} remaining tag sweep(s) after a failure: {}",
                        report.skipped_tags.len(),
                        report.skipped_tags.join(", ")
                    );
                }
                break;
            }
        }
        Ok(report)
    }

    /// One pass over every module with a fixed tag. Returns whether all passed.
    async fn run_sweep(
        &self,
        modules: &[Module],
        tag: Option<&str>,
        mode: RunMode,
        extra_args: &[String],
        report: &mut RunReport,
    ) -> Result<bool> {
        let started = Instant::now();
        let suffix = tag.map_or_else(String::new, |name| format!(" (tag: {name})"));
        let mut failed = 0;
        let mut profiles = Vec::new();
        let first_result = report.results.len();

        for (position, module) in modules.iter().enumerate() {
            info!("Running {mode} tests{suffix} in {}...", module.location());
            let profile_name = mode.coverage().then(|| profile_file_name(position, module, tag));
            let args = build_test_args(&self.config, mode, tag, extra_args, profile_name.as_deref());
            let spec = CommandSpec::new("go").args(args).current_dir(&module.path);

            let module_started = Instant::now();
            let outcome = self.executor.run(&spec).await;
            let duration = module_started.elapsed();

            let mut coverage_profile = None;
            let success = match outcome {
                Ok(()) => {
                    info!(
                        "{mode} tests passed for {}{suffix} in {}",
                        module.relative_path,
                        format_duration(duration)
                    );
                    if let Some(name) = &profile_name {
                        coverage_profile = self.collect_profile(module, name).await;
                        profiles.extend(coverage_profile.clone());
                    }
                    true
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!(
                        "{mode} tests failed for {}{suffix} in {}",
                        module.relative_path,
                        format_duration(duration)
                    );
                    report.failures.push(ModuleError::new(module.clone(), err));
                    failed += 1;
                    false
                }
            };

            report.results.push(ExecutionResult {
                module: module.clone(),
                tag: tag.map(str::to_owned),
                success,
                duration,
                coverage_profile,
            });
        }

        if mode.coverage() {
            match finalize_profiles(&self.root, &profiles, tag) {
                Ok(Some(canonical)) => {
                    for result in &mut report.results[first_result..] {
                        if result.coverage_profile.is_some() {
                            result.coverage_profile = Some(canonical.clone());
                        }
                    }
                    report.profiles.push(canonical);
                }
                Ok(None) => {}
                Err(err) => warn!("Failed to combine coverage profiles{suffix}: {err}"),
            }
        }

        if failed > 0 {
            error!("{mode} tests{suffix} failed in {failed}/{} modules", modules.len());
        } else {
            info!(
                "All {mode} tests{suffix} passed in {}",
                format_duration(started.elapsed())
            );
        }
        Ok(failed == 0)
    }

    /// Moves a module's fresh profile to the workspace root.
    async fn collect_profile(&self, module: &Module, name: &str) -> Option<PathBuf> {
        let written = module.path.join(name);
        if !written.is_file() {
            return None;
        }
        let destination = self.root.join(name);
        if written == destination {
            return Some(destination);
        }
        match rename(&written, &destination).await {
            Ok(()) => Some(destination),
            Err(err) => {
                warn!("Failed to move coverage file for {}: {err}", module.relative_path);
                None
            }
        }
    }

    /// `go build ./...` in every module.
    ///
    /// # Errors
    /// Returns immediately on a fatal error such as cancellation.
    pub async fn build(&self, modules: &[Module]) -> Result<RunReport> {
        let tags = self.config.extra_tags();
        let verbose = self.config.build.verbose;
        self.run_each("build", modules, |module| {
            let mut spec = CommandSpec::new("go").arg("build");
            if verbose {
                spec = spec.arg("-v");
            }
            if !tags.is_empty() {
                spec = spec.arg("-tags").arg(tags.join(","));
            }
            spec.arg(ALL_PACKAGES).current_dir(&module.path)
        })
        .await
    }

    /// `go vet ./...` in every module.
    ///
    /// # Errors
    /// Returns immediately on a fatal error such as cancellation.
    pub async fn vet(&self, modules: &[Module]) -> Result<RunReport> {
        let tags = self.config.extra_tags();
        self.run_each("vet", modules, |module| {
            let mut spec = CommandSpec::new("go").arg("vet");
            if !tags.is_empty() {
                spec = spec.arg("-tags").arg(tags.join(","));
            }
            spec.arg(ALL_PACKAGES).current_dir(&module.path)
        })
        .await
    }

    /// `golangci-lint run ./...` in every module.
    ///
    /// # Errors
    /// Returns immediately on a fatal error such as cancellation.
    pub async fn lint(&self, modules: &[Module]) -> Result<RunReport> {
        let timeout = self.config.lint.timeout.clone();
        self.run_each("lint", modules, |module| {
            let mut spec = CommandSpec::new("golangci-lint").arg("run");
            if let Some(value) = &timeout {
                spec = spec.arg("--timeout").arg(value.as_str());
            }
            spec.arg(ALL_PACKAGES).current_dir(&module.path)
        })
        .await
    }

    async fn run_each<F>(&self, operation: &str, modules: &[Module], spec_for: F) -> Result<RunReport>
    where
        F: Fn(&Module) -> CommandSpec + Send + Sync,
    {
        let modules = self.filter_modules(modules, operation);
        let mut report = RunReport {
            total_modules: modules.len(),
            ..RunReport::default()
        };
        let started = Instant::now();

        for module in &modules {
            info!("Running {operation} in {}...", module.location());
            let module_started = Instant::now();
            let outcome = self.executor.run(&spec_for(module)).await;
            let duration = module_started.elapsed();
            let success = match outcome {
                Ok(()) => {
                    info!(
                        "{operation} passed for {} in {}",
                        module.relative_path,
                        format_duration(duration)
                    );
                    true
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!(
                        "{operation} failed for {} in {}",
                        module.relative_path,
                        format_duration(duration)
                    );
                    report.failures.push(ModuleError::new(module.clone(), err));
                    false
                }
            };
            report.results.push(ExecutionResult {
                module: module.clone(),
                tag: None,
                success,
                duration,
                coverage_profile: None,
            });
        }

        if report.failures.is_empty() {
            info!(
                "{operation} passed for {} module(s) in {}",
                modules.len(),
                format_duration(started.elapsed())
            );
        } else {
            error!(
                "{operation} failed in {}/{} modules",
                report.failures.len(),
                modules.len()
            );
        }
        Ok(report)
    }
}
