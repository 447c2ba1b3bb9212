use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_core::{Config, Module, ModuleError, Result, aggregate};
use tessera_exec::Executor;
use tessera_modules::{
    DependencyResolver, GraphResolver, ModuleDiscovery, ModuleSource, Resolution, TagDiscovery,
    TagSource,
};
use tracing::{info, warn};

use crate::coverage::{CoverageReporter, MERGED_PROFILE};
use crate::mode::RunMode;
use crate::orchestrator::{RunReport, TestOrchestrator};

/// A discovered and ordered workspace.
#[derive(Debug, Default)]
pub struct WorkspacePlan {
    /// Modules in execution order.
    pub resolution: Resolution,
    /// Modules that could not be loaded.
    pub discovery_errors: Vec<ModuleError>,
}

impl WorkspacePlan {
    /// Modules in execution order.
    pub fn modules(&self) -> &[Module] {
        &self.resolution.order
    }
}

/// Result of build tag discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    /// Tags to sweep, sorted.
    pub tags: Vec<String>,
    /// Why discovery fell back to no tags, if it did.
    pub diagnostic: Option<String>,
}

/// Discovery, ordering, tag expansion and execution composed for one workspace.
pub struct Pipeline {
    root: PathBuf,
    executor: Arc<dyn Executor>,
    modules: Arc<dyn ModuleSource>,
    resolver: Arc<dyn DependencyResolver>,
    tags: Arc<dyn TagSource>,
    orchestrator: TestOrchestrator,
}

impl Pipeline {
    /// Pipeline over `root` with the filesystem-backed discovery, resolver and
    /// tag scanner.
    pub fn new(root: PathBuf, config: Config, executor: Arc<dyn Executor>) -> Self {
        let tags = Arc::new(TagDiscovery::new(&config.test.auto_discover_build_tags_exclude));
        let orchestrator = TestOrchestrator::new(Arc::clone(&executor), config, root.clone());
        Self {
            root,
            executor,
            modules: Arc::new(ModuleDiscovery::new()),
            resolver: Arc::new(GraphResolver::new()),
            tags,
            orchestrator,
        }
    }

    /// Replace the module source.
    #[must_use]
    pub fn with_module_source(mut self, modules: Arc<dyn ModuleSource>) -> Self {
        self.modules = modules;
        self
    }

    /// Replace the dependency resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the tag source.
    #[must_use]
    pub fn with_tag_source(mut self, tags: Arc<dyn TagSource>) -> Self {
        self.tags = tags;
        self
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The orchestrator driving module commands.
    pub fn orchestrator(&self) -> &TestOrchestrator {
        &self.orchestrator
    }

    /// Discover modules and order them.
    ///
    /// # Errors
    /// Fails when the root cannot be scanned, when no module could be loaded
    /// at all, or when the dependency graph has a cycle.
    pub async fn plan(&self) -> Result<WorkspacePlan> {
        let report = self.modules.discover(&self.root).await?;
        if report.modules.is_empty() {
            if let Some(err) = aggregate(report.errors, 0) {
                return Err(err);
            }
            warn!("No modules found under {}", self.root.display());
            return Ok(WorkspacePlan::default());
        }
        if report.modules.len() > 1 {
            info!("Found {} modules", report.modules.len());
        }

        let resolution = self.resolver.resolve(&report.modules)?;
        info!("Dependency order:\n{}", resolution.summary().trim_end());
        Ok(WorkspacePlan {
            resolution,
            discovery_errors: report.errors,
        })
    }

    /// Tags to sweep, honouring `test.auto_discover_build_tags`.
    ///
    /// A scan failure is not fatal: it yields no tags and a diagnostic.
    pub async fn discover_tags(&self) -> TagReport {
        if !self.orchestrator.config().test.auto_discover_build_tags {
            return TagReport::default();
        }
        match self.tags.discover_tags(&self.root).await {
            Ok(tags) => {
                if tags.is_empty() {
                    info!("No build tags discovered");
                } else {
                    info!("Discovered build tags: {}", tags.join(", "));
                }
                TagReport {
                    tags,
                    diagnostic: None,
                }
            }
            Err(err) => {
                warn!("Build tag discovery failed, running without tags: {err}");
                TagReport {
                    tags: Vec::new(),
                    diagnostic: Some(err.to_string()),
                }
            }
        }
    }

    /// Full test run in `mode`.
    ///
    /// Modules that failed to load are reported alongside command failures.
    /// Coverage modes print a report for the merged baseline profile.
    ///
    /// # Errors
    /// Fatal planning errors and cancellation are returned directly.
    pub async fn test(&self, mode: RunMode, extra_args: &[String]) -> Result<RunReport> {
        let WorkspacePlan {
            resolution,
            discovery_errors,
        } = self.plan().await?;
        let tags = self.discover_tags().await;
        let mut report = self
            .orchestrator
            .run_tests(&resolution.order, &tags.tags, mode, extra_args)
            .await?;
        merge_discovery_errors(&mut report, discovery_errors);

        if mode.coverage() {
            let merged = self.root.join(MERGED_PROFILE);
            if report.profiles.contains(&merged) {
                let reporter = CoverageReporter::new(
                    Arc::clone(&self.executor),
                    self.root.clone(),
                    &resolution.order,
                );
                if let Err(err) = reporter.report(&merged, false).await {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!("Coverage report failed: {err}");
                }
            }
        }
        Ok(report)
    }

    /// `go build` across the workspace.
    ///
    /// # Errors
    /// Fatal planning errors and cancellation are returned directly.
    pub async fn build(&self) -> Result<RunReport> {
        let plan = self.plan().await?;
        let mut report = self.orchestrator.build(plan.modules()).await?;
        merge_discovery_errors(&mut report, plan.discovery_errors);
        Ok(report)
    }

    /// `go vet` across the workspace.
    ///
    /// # Errors
    /// Fatal planning errors and cancellation are returned directly.
    pub async fn vet(&self) -> Result<RunReport> {
        let plan = self.plan().await?;
        let mut report = self.orchestrator.vet(plan.modules()).await?;
        merge_discovery_errors(&mut report, plan.discovery_errors);
        Ok(report)
    }

    /// `golangci-lint` across the workspace.
    ///
    /// # Errors
    /// Fatal planning errors and cancellation are returned directly.
    pub async fn lint(&self) -> Result<RunReport> {
        let plan = self.plan().await?;
        let mut report = self.orchestrator.lint(plan.modules()).await?;
        merge_discovery_errors(&mut report, plan.discovery_errors);
        Ok(report)
    }

    /// Render the merged baseline profile under the root.
    ///
    /// # Errors
    /// Planning errors, an unreadable profile or a failed report command.
    pub async fn coverage_report(&self, html: bool) -> Result<()> {
        let plan = self.plan().await?;
        let reporter =
            CoverageReporter::new(Arc::clone(&self.executor), self.root.clone(), plan.modules());
        reporter.report(&self.root.join(MERGED_PROFILE), html).await?;
        Ok(())
    }
}

fn merge_discovery_errors(report: &mut RunReport, errors: Vec<ModuleError>) {
    if errors.is_empty() {
        return;
    }
    report.total_modules += errors.len();
    let mut failures = errors;
    failures.append(&mut report.failures);
    report.failures = failures;
}
