//! Collapses per-module failures into one reportable error.

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt;

use crate::module::ModuleError;
use crate::Error;

/// Every failure from a multi-module sweep, with the sweep size for context.
#[derive(Debug)]
pub struct ModuleFailures {
    errors: Vec<ModuleError>,
    total_modules: usize,
}

impl ModuleFailures {
    /// The individual failures in the order they happened.
    pub fn errors(&self) -> &[ModuleError] {
        &self.errors
    }

    /// Number of modules the sweep covered.
    pub fn total_modules(&self) -> usize {
        self.total_modules
    }

    /// Number of distinct modules with at least one failure.
    pub fn failed_modules(&self) -> usize {
        self.errors
            .iter()
            .map(|failure| failure.module.relative_path.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Consumes the aggregate and returns the individual failures.
    pub fn into_errors(self) -> Vec<ModuleError> {
        self.errors
    }
}

impl fmt::Display for ModuleFailures {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.errors.as_slice() {
            let label = if single.module.is_root { "" } else { "module " };
            return write!(formatter, "{label}{}: {}", single.module.location(), single.error);
        }

        let failed = self.failed_modules();
        let total = self.total_modules.max(failed);
        write!(
            formatter,
            "{failed} of {total} modules failed ({} errors):",
            self.errors.len()
        )?;
        for failure in &self.errors {
            write!(formatter, "\n  - {}: {}", failure.module.location(), failure.error)?;
        }
        Ok(())
    }
}

impl StdError for ModuleFailures {}

/// Folds a sweep's failures into a single error, or `None` when there were none.
///
/// `total_modules` is the number of modules the sweep visited and is only used
/// for the summary line.
pub fn aggregate(errors: Vec<ModuleError>, total_modules: usize) -> Option<Error> {
    if errors.is_empty() {
        return None;
    }
    Some(Error::ModuleFailures(ModuleFailures {
        errors,
        total_modules,
    }))
}
