//! Workspace inspection: module discovery, dependency ordering and build tag scanning.
//!
//! Everything here reads the filesystem only. Nothing in this crate runs a
//! toolchain command.
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

/// Manifest discovery under a workspace root.
pub mod discovery;
/// Manifest parsing.
pub mod manifest;
/// Dependency graph construction and topological ordering.
pub mod resolver;
/// Build tag discovery.
pub mod tags;
/// Seams used by the orchestrator.
pub mod traits;
mod walk;

pub use discovery::{DiscoveryReport, ModuleDiscovery, sort_modules};
pub use manifest::{MANIFEST_FILE_NAME, Manifest, ReplaceTarget, Replacement, Requirement};
pub use resolver::{GraphResolver, Resolution, resolve_with_manifests};
pub use tags::{TagDiscovery, tags_in_expression, tags_in_source};
pub use traits::{DependencyResolver, ModuleSource, TagSource};
