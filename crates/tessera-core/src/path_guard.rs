//! Guards archive extraction against entries that escape the destination ("zip slip").

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Lexically normalises a path without touching the filesystem.
///
/// Repeated separators and `.` segments are dropped, `..` removes the
/// preceding normal segment, and `..` directly under the root is discarded.
/// Leading `..` segments of a relative path are kept. An empty result is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Resolves an archive entry path against `dest` and rejects it when it would
/// land outside `dest`.
///
/// Absolute entries are always rejected. The returned path is the cleaned join
/// of `dest` and `candidate`, equal to or below the cleaned `dest`.
///
/// # Errors
/// Returns [`Error::PathTraversalRejected`] for absolute entries, entries
/// containing NUL bytes and entries that climb out of `dest`.
pub fn validate_extract_path(dest: &Path, candidate: &str) -> Result<PathBuf> {
    let reject = |reason: &str| Error::PathTraversalRejected {
        candidate: candidate.to_owned(),
        reason: reason.to_owned(),
    };

    if candidate.contains('\0') {
        return Err(reject("contains a NUL byte"));
    }
    let candidate_path = Path::new(candidate);
    if candidate_path.is_absolute() || candidate_path.has_root() {
        return Err(reject("absolute paths are not allowed"));
    }

    let clean_dest = clean_path(dest);
    let joined = clean_path(&clean_dest.join(candidate_path));

    let remainder = if clean_dest == Path::new(".") {
        joined.as_path()
    } else {
        joined
            .strip_prefix(&clean_dest)
            .map_err(|_| reject("path escapes the destination directory"))?
    };
    if remainder
        .components()
        .any(|component| matches!(component, Component::ParentDir | Component::RootDir))
    {
        return Err(reject("path escapes the destination directory"));
    }

    Ok(joined)
}
