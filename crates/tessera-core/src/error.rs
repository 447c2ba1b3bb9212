use core::result::Result as CoreResult;
use std::error::Error as StdError;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use toml::de::Error as TomlError;

use crate::aggregate::ModuleFailures;
use crate::duration::format_duration;

/// Result type for tessera operations.
pub type Result<T> = CoreResult<T, Error>;

/// Sentinel placed in the source chain of every timeout error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context deadline exceeded")]
pub struct DeadlineExceeded;

/// Sentinel placed in the source chain of every cancellation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context canceled")]
pub struct Canceled;

/// Errors that can occur while discovering, scheduling or running modules.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested module directory has no manifest.
    #[error("no go.mod found in {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// A manifest could not be parsed.
    #[error("failed to parse {}:{line}: {reason}", .path.display())]
    ManifestParse {
        /// Manifest file.
        path: PathBuf,
        /// One-based line number of the offending line.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Two manifests declare the same module id.
    #[error("module {module_id} declared twice: {} and {}", .first.display(), .second.display())]
    DuplicateModule {
        /// The shared module id.
        module_id: String,
        /// Directory of the first declaration.
        first: PathBuf,
        /// Directory of the second declaration.
        second: PathBuf,
    },

    /// Local replace directives form a cycle.
    #[error("cyclic dependency between modules: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A command ran past its deadline.
    #[error("command '{command}'{} exceeded timeout of {}: {source}", describe_dir(.dir.as_deref()), timeout_text(.timeout))]
    ExecutionTimeout {
        /// Program name.
        command: String,
        /// Working directory, when one was given.
        dir: Option<PathBuf>,
        /// The configured budget.
        timeout: Duration,
        /// Deadline sentinel.
        source: DeadlineExceeded,
    },

    /// A command was canceled by the caller.
    #[error("command '{command}'{} was canceled: {source}", describe_dir(.dir.as_deref()))]
    ExecutionCanceled {
        /// Program name.
        command: String,
        /// Working directory, when one was given.
        dir: Option<PathBuf>,
        /// Cancellation sentinel.
        source: Canceled,
    },

    /// A command exited unsuccessfully.
    #[error("command '{command} {}'{} failed: {status}", .args.join(" "), describe_dir(.dir.as_deref()))]
    ExecutionFailed {
        /// Program name.
        command: String,
        /// Arguments passed to the program.
        args: Vec<String>,
        /// Working directory, when one was given.
        dir: Option<PathBuf>,
        /// Exit status description.
        status: String,
        /// Captured output, empty when output was streamed.
        output: String,
    },

    /// A command could not be started.
    #[error("failed to start '{command}': {source}")]
    Spawn {
        /// Program name.
        command: String,
        /// Underlying spawn error.
        source: IoError,
    },

    /// A command failed validation and was never started.
    #[error("command '{command}' rejected: {reason}")]
    CommandRejected {
        /// Program name.
        command: String,
        /// Validation failure.
        reason: String,
    },

    /// Coverage merge was called with no inputs.
    #[error("no coverage files to merge")]
    NoProfilesToMerge,

    /// A coverage profile could not be read.
    #[error("failed to read coverage profile {}: {source}", .path.display())]
    ProfileRead {
        /// Profile path.
        path: PathBuf,
        /// Underlying read error.
        source: IoError,
    },

    /// A coverage profile could not be written.
    #[error("failed to write coverage profile {}: {source}", .path.display())]
    ProfileWrite {
        /// Profile path.
        path: PathBuf,
        /// Underlying write error.
        source: IoError,
    },

    /// An archive entry would escape its extraction directory.
    #[error("invalid path {candidate:?}: {reason}")]
    PathTraversalRejected {
        /// The rejected entry path.
        candidate: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Build tag discovery could not scan the tree.
    #[error("failed to scan {} for build tags: {reason}", .path.display())]
    TagScan {
        /// Scan root.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// One or more modules failed during a sweep.
    #[error(transparent)]
    ModuleFailures(ModuleFailures),
}

impl Error {
    /// Returns `true` when a [`DeadlineExceeded`] sentinel is anywhere in the source chain.
    pub fn is_deadline_exceeded(&self) -> bool {
        chain_contains::<DeadlineExceeded>(self)
    }

    /// Returns `true` when a [`Canceled`] sentinel is anywhere in the source chain.
    pub fn is_canceled(&self) -> bool {
        chain_contains::<Canceled>(self)
    }

    /// Whether this error invalidates the whole plan rather than a single module.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CyclicDependency(_) | Self::ExecutionCanceled { .. })
    }
}

fn chain_contains<T: StdError + 'static>(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<T>() {
            return true;
        }
        current = err.source();
    }
    false
}

fn describe_dir(dir: Option<&Path>) -> String {
    dir.map_or_else(String::new, |path| format!(" in {}", path.display()))
}

#[allow(
    clippy::trivially_copy_pass_by_ref,
    reason = "error format arguments borrow their fields"
)]
fn timeout_text(timeout: &Duration) -> String {
    format_duration(*timeout)
}
