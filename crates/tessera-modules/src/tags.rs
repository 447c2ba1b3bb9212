use std::collections::BTreeSet;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tessera_core::{Error, Result};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::traits::TagSource;
use crate::walk::walk_files;

const BUILD_DIRECTIVE: &str = "//go:build";
const LEGACY_DIRECTIVE: &str = "// +build";
const SOURCE_EXTENSION: &str = "go";

/// Directories that never hold sources built by the toolchain.
const TAG_SKIPPED: &[&str] = &["testdata"];

/// Words that read as operators in a tag expression.
const OPERATOR_WORDS: &[&str] = &["and", "or", "not"];

static TAG_IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").ok());

/// Finds build tags used by source files under a tree.
#[derive(Debug, Clone, Default)]
pub struct TagDiscovery {
    exclude: BTreeSet<String>,
}

impl TagDiscovery {
    /// Create a discoverer that drops the given tags from its results.
    ///
    /// Exclusion entries are trimmed; empty entries are ignored.
    pub fn new<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exclude: exclude
                .into_iter()
                .map(|tag| tag.as_ref().trim().to_owned())
                .filter(|tag| !tag.is_empty())
                .collect(),
        }
    }

    /// Sorted, distinct tags referenced by build directives under `root`.
    ///
    /// Files that cannot be read are skipped with a warning.
    ///
    /// # Errors
    /// Returns [`Error::TagScan`] when `root` is missing or not a directory.
    pub fn scan(&self, root: &Path) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Err(Error::TagScan {
                path: root.to_path_buf(),
                reason: "not an existing directory".to_owned(),
            });
        }

        let mut tags = BTreeSet::new();
        for entry in walk_files(root, TAG_SKIPPED) {
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }
            match read_to_string(entry.path()) {
                Ok(content) => {
                    let found = tags_in_source(&content);
                    if !found.is_empty() {
                        debug!("{}: build tags {found:?}", entry.path().display());
                    }
                    tags.extend(found);
                }
                Err(err) => warn!("Skipping {} during tag scan: {err}", entry.path().display()),
            }
        }

        Ok(tags
            .into_iter()
            .filter(|tag| !self.exclude.contains(tag))
            .collect())
    }
}

#[async_trait]
impl TagSource for TagDiscovery {
    async fn discover_tags(&self, root: &Path) -> Result<Vec<String>> {
        let discovery = self.clone();
        let path = root.to_path_buf();
        spawn_blocking(move || discovery.scan(&path))
            .await
            .map_err(|err| Error::TagScan {
                path: root.to_path_buf(),
                reason: err.to_string(),
            })?
    }
}

/// Tags named by the build directives in a file's header.
///
/// The header ends at the `package` clause or at the first line that is not
/// blank or a comment.
pub fn tags_in_source(content: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let mut in_block_comment = false;
    for raw in content.lines() {
        let line = raw.trim();
        if in_block_comment {
            in_block_comment = !line.contains("*/");
            continue;
        }
        if let Some(expression) = line.strip_prefix(BUILD_DIRECTIVE) {
            tags.extend(tags_in_expression(expression));
        } else if let Some(expression) = line.strip_prefix(LEGACY_DIRECTIVE) {
            tags.extend(tags_in_expression(expression));
        } else if line.starts_with("/*") {
            in_block_comment = !line.contains("*/");
        } else if line.is_empty() || line.starts_with("//") {
            continue;
        } else {
            break;
        }
    }
    tags
}

/// Simple tag names in a build expression, in order of appearance.
///
/// Handles both `a && (b || !c)` and legacy `a,!b c` syntax.
pub fn tags_in_expression(expression: &str) -> Vec<String> {
    let Some(pattern) = TAG_IDENTIFIER.as_ref() else {
        return Vec::new();
    };
    pattern
        .find_iter(expression)
        .map(|found| found.as_str())
        .filter(|word| !OPERATOR_WORDS.contains(word))
        .map(str::to_owned)
        .collect()
}
