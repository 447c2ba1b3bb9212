//! End-to-end pipeline runs over real workspace trees.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

mod common;

use std::fs::canonicalize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use common::{RecordingExecutor, put, shared};
use tempfile::TempDir;
use tessera_core::{Config, Error, Result};
use tessera_modules::TagSource;
use tessera_orchestrator::{Pipeline, RunMode, RunStatus};

struct FailingTags;

#[async_trait]
impl TagSource for FailingTags {
    async fn discover_tags(&self, root: &Path) -> Result<Vec<String>> {
        Err(Error::TagScan {
            path: root.to_path_buf(),
            reason: "permission denied".to_owned(),
        })
    }
}

/// Root module plus `sub`, which replaces the root onto `../`.
fn workspace() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = canonicalize(temp.path()).unwrap();
    put(&root, "go.mod", "module example.com/app\n\ngo 1.22\n");
    put(
        &root,
        "sub/go.mod",
        "module example.com/app/sub\n\nrequire example.com/app v0.0.0\n\nreplace example.com/app => ../\n",
    );
    (temp, root)
}

#[tokio::test]
async fn test_runs_baseline_then_discovered_tags() {
    let (_temp, root) = workspace();
    put(&root, "sub/it_test.go", "//go:build integration\n\npackage sub\n");
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(root.clone(), Config::default(), executor);

    let report = pipeline.test(RunMode::Unit, &[]).await.unwrap();

    assert_eq!(report.status(), RunStatus::Succeeded);
    assert_eq!(
        recorder.call_lines(&root),
        vec![
            ". :: go test -timeout 10m -short ./...",
            "sub :: go test -timeout 10m -short ./...",
            ". :: go test -timeout 10m -tags integration -short ./...",
            "sub :: go test -timeout 10m -tags integration -short ./...",
        ]
    );
}

#[tokio::test]
async fn test_disabled_tag_discovery_runs_baseline_only() {
    let (_temp, root) = workspace();
    put(&root, "it_test.go", "//go:build integration\n\npackage app\n");
    let mut config = Config::default();
    config.test.auto_discover_build_tags = false;
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(root.clone(), config, executor);

    assert!(pipeline.discover_tags().await.tags.is_empty());
    pipeline.test(RunMode::Short, &[]).await.unwrap();
    assert_eq!(recorder.calls().len(), 2);
}

#[tokio::test]
async fn test_tag_scan_failure_falls_back_to_baseline() {
    let (_temp, root) = workspace();
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(root.clone(), Config::default(), executor)
        .with_tag_source(Arc::new(FailingTags));

    let tags = pipeline.discover_tags().await;
    assert!(tags.tags.is_empty());
    assert!(tags.diagnostic.unwrap().contains("permission denied"));

    let report = pipeline.test(RunMode::Unit, &[]).await.unwrap();
    assert_eq!(report.status(), RunStatus::Succeeded);
    assert_eq!(recorder.calls().len(), 2);
}

#[tokio::test]
async fn test_unloadable_module_is_reported_with_the_run() {
    let (_temp, root) = workspace();
    put(&root, "broken/go.mod", "go 1.22\n");
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(root.clone(), Config::default(), executor);

    let report = pipeline.build().await.unwrap();

    assert_eq!(recorder.calls().len(), 2);
    assert_eq!(report.total_modules, 3);
    assert_eq!(report.status(), RunStatus::PartiallyFailed);
    assert_eq!(report.failures[0].module.relative_path, "broken");
    assert!(matches!(report.failures[0].error, Error::ManifestParse { .. }));
}

#[tokio::test]
async fn test_cycle_stops_before_running_anything() {
    let temp = TempDir::new().unwrap();
    let root = canonicalize(temp.path()).unwrap();
    put(&root, "a/go.mod", "module a\nreplace b => ../b\n");
    put(&root, "b/go.mod", "module b\nreplace a => ../a\n");
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(root, Config::default(), executor);

    let error = pipeline.vet().await.unwrap_err();
    assert!(matches!(error, Error::CyclicDependency(_)));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_empty_workspace_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let (recorder, executor) = shared(RecordingExecutor::new());
    let pipeline = Pipeline::new(temp.path().to_path_buf(), Config::default(), executor);

    let plan = pipeline.plan().await.unwrap();
    assert!(plan.modules().is_empty());
    let report = pipeline.lint().await.unwrap();
    assert_eq!(report.status(), RunStatus::Succeeded);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_single_module_coverage_is_reported() {
    let temp = TempDir::new().unwrap();
    let root = canonicalize(temp.path()).unwrap();
    put(&root, "go.mod", "module example.com/solo\n");
    let executor = RecordingExecutor::new()
        .writing_profiles(|_| "mode: set\nexample.com/solo/a.go:1.1,2.2 1 1\n".to_owned());
    let (recorder, executor) = shared(executor);
    let pipeline = Pipeline::new(root.clone(), Config::default(), executor);

    let report = pipeline.test(RunMode::Coverage, &[]).await.unwrap();

    assert_eq!(report.profiles, vec![root.join("coverage.txt")]);
    let lines = recorder.call_lines(&root);
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        format!(". :: go tool cover -func={}", root.join("coverage.txt").display())
    );
}

#[tokio::test]
async fn test_cross_module_coverage_skips_the_report() {
    let (_temp, root) = workspace();
    let executor = RecordingExecutor::new().writing_profiles(|dir| {
        let package = if dir.ends_with("sub") {
            "example.com/app/sub"
        } else {
            "example.com/app"
        };
        format!("mode: atomic\n{package}/a.go:1.1,2.2 1 1\n")
    });
    let (recorder, executor) = shared(executor);
    let pipeline = Pipeline::new(root.clone(), Config::default(), executor);

    let report = pipeline.test(RunMode::Coverage, &[]).await.unwrap();

    assert_eq!(report.profiles, vec![root.join("coverage.txt")]);
    assert!(
        recorder
            .calls()
            .iter()
            .all(|spec| !spec.get_args().iter().any(|arg| arg == "tool"))
    );
}
