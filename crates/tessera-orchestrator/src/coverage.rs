use std::fs::{read_to_string, remove_file, rename, write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_core::{Error, Module, Result};
use tessera_exec::{CommandSpec, Executor};
use tracing::{debug, info, warn};

/// Name of the merged baseline profile.
pub const MERGED_PROFILE: &str = "coverage.txt";
/// Name of the HTML report written next to the merged profile.
pub const HTML_REPORT: &str = "coverage.html";

const MODE_PREFIX: &str = "mode:";

/// Per-run profile file name for the module at `position` in a sweep.
///
/// The leading position keeps names unique within a sweep whatever the
/// relative paths look like, and since tags never start with a digit the
/// names cannot clash with [`merged_profile_name`]. The rest is a readable
/// label: `root` for the root module, otherwise the relative path with
/// separators replaced by `_`.
pub fn profile_file_name(position: usize, module: &Module, tag: Option<&str>) -> String {
    let label = if module.is_root {
        "root".to_owned()
    } else {
        module.relative_path.replace(['/', '\\'], "_")
    };
    match tag {
        Some(tag_name) => format!("coverage_{position}_{label}_{tag_name}.txt"),
        None => format!("coverage_{position}_{label}.txt"),
    }
}

/// Merged profile name for a sweep: `coverage.txt` or `coverage_<tag>.txt`.
pub fn merged_profile_name(tag: Option<&str>) -> String {
    tag.map_or_else(|| MERGED_PROFILE.to_owned(), |name| format!("coverage_{name}.txt"))
}

/// Merges profile texts: the first header line, then every other non-empty
/// line in input order. Each output line ends with a newline.
pub fn merge_contents<'text, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'text str>,
{
    let mut merged = String::new();
    let mut header_written = false;
    for content in contents {
        for (index, line) in content.lines().enumerate() {
            if index == 0 && line.starts_with(MODE_PREFIX) {
                if !header_written {
                    header_written = true;
                    merged.push_str(line);
                    merged.push('\n');
                }
                continue;
            }
            if !line.is_empty() {
                merged.push_str(line);
                merged.push('\n');
            }
        }
    }
    merged
}

/// Merge the profiles at `inputs` into `output`.
///
/// # Errors
/// [`Error::NoProfilesToMerge`] for an empty input list, [`Error::ProfileRead`]
/// naming the first unreadable input, [`Error::ProfileWrite`] if `output`
/// cannot be written.
pub fn merge_profiles(inputs: &[PathBuf], output: &Path) -> Result<()> {
    if inputs.is_empty() {
        return Err(Error::NoProfilesToMerge);
    }
    let contents = inputs
        .iter()
        .map(|path| {
            read_to_string(path).map_err(|source| Error::ProfileRead {
                path: path.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_contents(contents.iter().map(String::as_str));
    write(output, merged).map_err(|source| Error::ProfileWrite {
        path: output.to_path_buf(),
        source,
    })?;
    debug!("Merged {} profile(s) into {}", inputs.len(), output.display());
    Ok(())
}

/// Turns the per-module profiles of one sweep into its canonical file under `root`.
///
/// A single profile is renamed; several are merged and the inputs removed.
/// Returns the canonical path, or `None` when the sweep produced no profiles.
///
/// # Errors
/// Propagates merge failures; a failed rename is reported as [`Error::ProfileWrite`].
pub fn finalize_profiles(root: &Path, profiles: &[PathBuf], tag: Option<&str>) -> Result<Option<PathBuf>> {
    let target = root.join(merged_profile_name(tag));
    match profiles {
        [] => return Ok(None),
        [single] => {
            rename(single, &target).map_err(|source| Error::ProfileWrite {
                path: target.clone(),
                source,
            })?;
        }
        several => {
            info!("Merging {} coverage profiles into {}", several.len(), target.display());
            merge_profiles(several, &target)?;
            for profile in several {
                if let Err(err) = remove_file(profile) {
                    warn!("Failed to remove coverage file {}: {err}", profile.display());
                }
            }
        }
    }
    Ok(Some(target))
}

/// Maps profile package paths onto discovered modules.
#[derive(Debug, Clone, Default)]
pub struct CoverageAttribution {
    /// `(module id, is root)`, longest id first.
    modules: Vec<(String, bool)>,
}

impl CoverageAttribution {
    /// Attribution over the given modules.
    pub fn new(modules: &[Module]) -> Self {
        let mut entries: Vec<(String, bool)> = modules
            .iter()
            .map(|module| (module.module_id.clone(), module.is_root))
            .collect();
        entries.sort_by(|left, right| right.0.len().cmp(&left.0.len()).then_with(|| left.0.cmp(&right.0)));
        Self { modules: entries }
    }

    /// Module id owning `package`: the longest id equal to it or a prefix
    /// ending on a `/` boundary.
    pub fn owner(&self, package: &str) -> Option<&str> {
        self.entry_for(package).map(|(module_id, _)| module_id.as_str())
    }

    fn entry_for(&self, package: &str) -> Option<&(String, bool)> {
        self.modules.iter().find(|(module_id, _)| {
            package == module_id
                || package
                    .strip_prefix(module_id.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Whether any statement in `profile` lies outside the root module,
    /// including statements in nested modules and in no known module.
    pub fn is_cross_module(&self, profile: &str) -> bool {
        profile
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with(MODE_PREFIX))
            .filter_map(statement_package)
            .any(|package| match self.entry_for(package) {
                Some((module_id, false)) => {
                    debug!("Coverage for {package} belongs to nested module {module_id}");
                    true
                }
                Some((_, true)) => false,
                None => {
                    debug!("Coverage for {package} belongs to no workspace module");
                    true
                }
            })
    }
}

/// Package path of a statement line: the file path before `:` minus its file name.
fn statement_package(line: &str) -> Option<&str> {
    let (file, _) = line.split_once(':')?;
    Some(file.rsplit_once('/').map_or(file, |(package, _)| package))
}

/// What [`CoverageReporter::report`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The toolchain rendered the report.
    Rendered,
    /// The profile spans several modules; no report was attempted.
    CrossModule,
    /// There was no profile to report on.
    Missing,
}

/// Renders merged profiles with `go tool cover`.
pub struct CoverageReporter {
    executor: Arc<dyn Executor>,
    root: PathBuf,
    attribution: CoverageAttribution,
}

impl CoverageReporter {
    /// Reporter running commands in `root`, attributing statements to `modules`.
    pub fn new(executor: Arc<dyn Executor>, root: PathBuf, modules: &[Module]) -> Self {
        Self {
            executor,
            root,
            attribution: CoverageAttribution::new(modules),
        }
    }

    /// Print a per-function summary of `profile`, and write an HTML report
    /// when `html` is set.
    ///
    /// Cross-module profiles get a diagnostic instead of a report.
    ///
    /// # Errors
    /// [`Error::ProfileRead`] if the profile cannot be read, or the failure of
    /// the report command.
    pub async fn report(&self, profile: &Path, html: bool) -> Result<ReportOutcome> {
        if !profile.is_file() {
            warn!("No coverage profile at {}; run a coverage sweep first", profile.display());
            return Ok(ReportOutcome::Missing);
        }
        let content = read_to_string(profile).map_err(|source| Error::ProfileRead {
            path: profile.to_path_buf(),
            source,
        })?;
        if self.attribution.is_cross_module(&content) {
            info!(
                "{} covers packages from several modules; it is kept for external tools but `go tool cover` reports are skipped",
                profile.display()
            );
            return Ok(ReportOutcome::CrossModule);
        }

        let profile_arg = profile.display().to_string();
        info!("Coverage report:");
        self.executor
            .run(
                &CommandSpec::new("go")
                    .args(["tool", "cover"])
                    .arg(format!("-func={profile_arg}"))
                    .current_dir(&self.root),
            )
            .await?;

        if html {
            let output = self.root.join(HTML_REPORT);
            self.executor
                .run(
                    &CommandSpec::new("go")
                        .args(["tool", "cover"])
                        .arg(format!("-html={profile_arg}"))
                        .arg(format!("-o={}", output.display()))
                        .current_dir(&self.root),
                )
                .await?;
            info!("Coverage report generated: {}", output.display());
        }
        Ok(ReportOutcome::Rendered)
    }
}
