use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::Error;

/// Relative path used for the workspace root module.
pub const ROOT_RELATIVE_PATH: &str = ".";

/// A discovered module: one manifest and the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Module {
    /// Absolute directory containing the manifest.
    pub path: PathBuf,
    /// Identifier declared by the manifest's `module` directive.
    pub module_id: String,
    /// Slash-separated location relative to the workspace root, `"."` for the root.
    pub relative_path: String,
    /// Whether this is the module at the workspace root.
    pub is_root: bool,
    /// Display label, the last segment of the module id.
    pub name: String,
}

impl Module {
    /// Builds a module record for `path` inside the workspace rooted at `root`.
    pub fn new(root: &Path, path: PathBuf, module_id: String) -> Self {
        let relative_path = relative_slash_path(root, &path);
        let is_root = relative_path == ROOT_RELATIVE_PATH;
        let name = module_id
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&module_id)
            .to_owned();

        Self {
            path,
            module_id,
            relative_path,
            is_root,
            name,
        }
    }

    /// Human label used in failure listings: `main module` for the root,
    /// otherwise the relative path.
    pub fn location(&self) -> &str {
        if self.is_root {
            "main module"
        } else {
            &self.relative_path
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.module_id, self.relative_path)
    }
}

/// A failure produced by one module during an operation.
#[derive(Debug)]
pub struct ModuleError {
    /// The module that failed.
    pub module: Module,
    /// What went wrong.
    pub error: Error,
}

impl ModuleError {
    /// Pairs a module with its error.
    pub fn new(module: Module, error: Error) -> Self {
        Self { module, error }
    }
}

/// Renders `path` relative to `root` with forward slashes; `"."` when equal.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_string_lossy().replace('\\', "/");
    };
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        ROOT_RELATIVE_PATH.to_owned()
    } else {
        segments.join("/")
    }
}
