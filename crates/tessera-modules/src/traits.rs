use std::path::Path;

use async_trait::async_trait;
use tessera_core::{Module, Result};

use crate::discovery::DiscoveryReport;
use crate::resolver::Resolution;

/// Produces the modules of a workspace.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Find every module under `root`.
    ///
    /// # Errors
    /// Returns an error when `root` cannot be scanned at all. Problems with
    /// individual modules are carried in the report.
    async fn discover(&self, root: &Path) -> Result<DiscoveryReport>;
}

/// Orders modules so that dependencies come first.
pub trait DependencyResolver: Send + Sync {
    /// Resolve an execution order for `modules`.
    ///
    /// # Errors
    /// Returns an error if a manifest cannot be read or the graph has a cycle.
    fn resolve(&self, modules: &[Module]) -> Result<Resolution>;
}

/// Produces the build tags used in a tree.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Sorted, distinct tags under `root`.
    ///
    /// # Errors
    /// Returns an error if `root` cannot be scanned.
    async fn discover_tags(&self, root: &Path) -> Result<Vec<String>>;
}
