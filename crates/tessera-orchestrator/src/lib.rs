//! Test, build and coverage orchestration across a multi-module workspace.
//!
//! [`Pipeline`] ties discovery, dependency ordering and tag discovery to a
//! [`TestOrchestrator`], which runs toolchain commands module by module
//! through an injected [`tessera_exec::Executor`].
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

/// `go test` argument construction.
pub mod args;
/// Coverage profile naming, merging, attribution and reporting.
pub mod coverage;
/// Test run modes.
pub mod mode;
/// Per-module command sweeps.
pub mod orchestrator;
/// End-to-end composition of discovery, ordering and execution.
pub mod pipeline;

pub use args::{build_test_args, sanitize_extra_args};
pub use coverage::{
    CoverageAttribution, CoverageReporter, MERGED_PROFILE, ReportOutcome, finalize_profiles,
    merge_contents, merge_profiles, profile_file_name,
};
pub use mode::RunMode;
pub use orchestrator::{ExecutionResult, RunReport, RunStatus, TestOrchestrator};
pub use pipeline::{Pipeline, TagReport, WorkspacePlan};
