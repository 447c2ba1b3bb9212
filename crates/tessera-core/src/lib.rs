//! Core types for the tessera workspace runner.
//!
//! This crate holds the module data model, the shared error taxonomy, the
//! multi-module error aggregator, configuration loading and the archive path
//! validator. Every other tessera crate builds on these definitions.
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

/// Aggregation of per-module failures into a single error.
pub mod aggregate;
/// Workspace configuration loaded from `.tessera.toml` and the environment.
pub mod config;
/// Parsing and formatting of toolchain-style duration strings.
pub mod duration;
/// Error types and result definitions.
pub mod error;
/// Module records shared by discovery, resolution and orchestration.
pub mod module;
/// Archive extraction path validation.
pub mod path_guard;

pub use aggregate::{ModuleFailures, aggregate};
pub use config::{BuildConfig, Config, LintConfig, TestConfig, TimeoutConfig};
pub use duration::{format_duration, parse_go_duration};
pub use error::{Canceled, DeadlineExceeded, Error, Result};
pub use module::{Module, ModuleError};
pub use path_guard::{clean_path, validate_extract_path};
