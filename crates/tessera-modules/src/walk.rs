use std::collections::HashSet;
use std::fs::canonicalize;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Version control and vendored dependency directories.
const ALWAYS_SKIPPED: &[&str] = &[".git", ".hg", ".svn", "vendor", "node_modules"];

/// Hidden directories that still hold modules or sources.
const HIDDEN_ALLOWED: &[&str] = &[".github"];

/// Walks `root` following symlinks, skipping excluded directories and any
/// directory already visited under another name.
///
/// Unreadable entries and symlink loops are logged and skipped.
pub(crate) fn walk_files(
    root: &Path,
    extra_skipped: &'static [&'static str],
) -> impl Iterator<Item = DirEntry> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            if entry.depth() > 0 && is_skipped_dir(entry, extra_skipped) {
                return false;
            }
            let key = canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
            visited.insert(key)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("Skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
}

fn is_skipped_dir(entry: &DirEntry, extra_skipped: &[&str]) -> bool {
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    if ALWAYS_SKIPPED.contains(&name) || extra_skipped.contains(&name) {
        return true;
    }
    name.starts_with('.') && !HIDDEN_ALLOWED.contains(&name)
}
