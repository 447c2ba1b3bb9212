use std::collections::HashMap;
use std::fs::canonicalize;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tessera_core::module::relative_slash_path;
use tessera_core::{Error, Module, ModuleError, Result};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::manifest::{MANIFEST_FILE_NAME, Manifest};
use crate::traits::ModuleSource;
use crate::walk::walk_files;

/// Modules found under a root, plus per-module problems that did not stop the scan.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Valid modules, root first, then by relative path.
    pub modules: Vec<Module>,
    /// Modules whose manifest was unusable.
    pub errors: Vec<ModuleError>,
}

/// Finds module manifests on disk.
#[derive(Debug, Clone, Default)]
pub struct ModuleDiscovery;

impl ModuleDiscovery {
    /// Create a discovery walker.
    pub fn new() -> Self {
        Self
    }

    /// Walk `root` and parse every manifest found.
    ///
    /// A manifest that fails to parse, or that repeats an already declared
    /// module id, is reported in [`DiscoveryReport::errors`] and left out of
    /// the module list.
    ///
    /// # Errors
    /// Returns an error only when `root` itself cannot be resolved.
    pub fn scan(&self, root: &Path) -> Result<DiscoveryReport> {
        let root = canonicalize(root)?;
        if !root.is_dir() {
            return Err(Error::Io(IoError::other(format!(
                "{} is not a directory",
                root.display()
            ))));
        }

        let mut report = DiscoveryReport::default();
        for entry in walk_files(&root, &[]) {
            if entry.file_name() != MANIFEST_FILE_NAME {
                continue;
            }
            let Some(dir) = entry.path().parent().map(Path::to_path_buf) else {
                continue;
            };
            match Manifest::read(entry.path()) {
                Ok(manifest) => {
                    let module = Module::new(&root, dir, manifest.module_id);
                    debug!("Found module {module}");
                    report.modules.push(module);
                }
                Err(err) => {
                    warn!("Skipping {}: {err}", entry.path().display());
                    let fallback_id = relative_slash_path(&root, &dir);
                    report
                        .errors
                        .push(ModuleError::new(Module::new(&root, dir, fallback_id), err));
                }
            }
        }

        sort_modules(&mut report.modules);
        reject_duplicates(&mut report);
        info!(
            "Discovered {} module(s) under {}",
            report.modules.len(),
            root.display()
        );
        Ok(report)
    }

    /// Load the single module whose manifest lives directly in `dir`.
    ///
    /// # Errors
    /// Returns [`Error::ManifestNotFound`] when `dir` has no manifest, or the
    /// manifest's parse error.
    pub fn discover_module_at(&self, root: &Path, dir: &Path) -> Result<Module> {
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            return Err(Error::ManifestNotFound(dir.to_path_buf()));
        }
        let manifest = Manifest::read(&manifest_path)?;
        let root = canonicalize(root)?;
        let dir = canonicalize(dir)?;
        Ok(Module::new(&root, dir, manifest.module_id))
    }
}

#[async_trait]
impl ModuleSource for ModuleDiscovery {
    async fn discover(&self, root: &Path) -> Result<DiscoveryReport> {
        let discovery = self.clone();
        let root = root.to_path_buf();
        spawn_blocking(move || discovery.scan(&root))
            .await
            .map_err(|err| Error::Io(IoError::other(err)))?
    }
}

/// Root module first, then ascending relative path.
pub fn sort_modules(modules: &mut [Module]) {
    modules.sort_by(|left, right| {
        right
            .is_root
            .cmp(&left.is_root)
            .then_with(|| left.relative_path.cmp(&right.relative_path))
    });
}

fn reject_duplicates(report: &mut DiscoveryReport) {
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(report.modules.len());
    for module in report.modules.drain(..) {
        if let Some(first) = seen.get(&module.module_id) {
            let error = Error::DuplicateModule {
                module_id: module.module_id.clone(),
                first: first.clone(),
                second: module.path.clone(),
            };
            warn!("{error}");
            report.errors.push(ModuleError::new(module, error));
            continue;
        }
        seen.insert(module.module_id.clone(), module.path.clone());
        unique.push(module);
    }
    report.modules = unique;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(relative: &str, is_root: bool) -> Module {
        let path = if is_root {
            PathBuf::from("/w")
        } else {
            Path::new("/w").join(relative)
        };
        Module::new(Path::new("/w"), path, format!("m/{relative}"))
    }

    #[test]
    fn test_sort_puts_root_first() {
        let mut modules = vec![module("b", false), module("a/z", false), module(".", true), module("a", false)];
        sort_modules(&mut modules);
        let order: Vec<_> = modules.iter().map(|module| module.relative_path.as_str()).collect();
        assert_eq!(order, vec![".", "a", "a/z", "b"]);
    }

    #[test]
    fn test_duplicates_are_reported() {
        let mut first = module("a", false);
        first.module_id = "same".to_owned();
        let mut second = module("b", false);
        second.module_id = "same".to_owned();
        let mut report = DiscoveryReport {
            modules: vec![first, second],
            errors: Vec::new(),
        };
        reject_duplicates(&mut report);
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].relative_path, "a");
        assert!(matches!(report.errors[0].error, Error::DuplicateModule { .. }));
    }
}
