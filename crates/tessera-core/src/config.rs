use std::collections::BTreeMap;
use std::env;
use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::duration::parse_go_duration;
use crate::{Error, Result};

/// File name looked up at the workspace root.
pub const CONFIG_FILE_NAME: &str = ".tessera.toml";

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "TESSERA_";

/// Workspace configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings shared by build-style commands.
    pub build: BuildConfig,
    /// Test sweep settings.
    pub test: TestConfig,
    /// Linter settings.
    pub lint: LintConfig,
    /// Overrides for the executor's timeout table.
    pub timeouts: TimeoutConfig,
}

/// Settings shared by build, vet and test invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Tags passed to every invocation in addition to the discovered ones.
    pub tags: Vec<String>,
    /// Print each command before running it.
    pub verbose: bool,
}

/// Test sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Value for `-p`; `0` leaves the toolchain default.
    pub parallel: usize,
    /// Pass `-v`.
    pub verbose: bool,
    /// Value for `-timeout`, in toolchain duration notation.
    pub timeout: Option<String>,
    /// Extra tags for test runs only.
    pub tags: Vec<String>,
    /// Pass `-race` in non-race modes too.
    pub race: bool,
    /// Pass `-cover` in non-coverage modes.
    pub cover: bool,
    /// Counting mode for coverage runs.
    pub cover_mode: String,
    /// Packages passed to `-coverpkg`.
    pub cover_pkg: Vec<String>,
    /// Pass `-short` in every mode.
    pub short: bool,
    /// Pass `-shuffle=on`.
    pub shuffle: bool,
    /// Run the tag matrix from discovered build tags.
    pub auto_discover_build_tags: bool,
    /// Tags never added to the matrix.
    pub auto_discover_build_tags_exclude: Vec<String>,
    /// Module names skipped entirely.
    pub exclude_modules: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            parallel: 0,
            verbose: false,
            timeout: Some("10m".to_owned()),
            tags: Vec::new(),
            race: false,
            cover: false,
            cover_mode: "atomic".to_owned(),
            cover_pkg: Vec::new(),
            short: false,
            shuffle: false,
            auto_discover_build_tags: true,
            auto_discover_build_tags_exclude: Vec::new(),
            exclude_modules: Vec::new(),
        }
    }
}

/// Linter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Value for the linter's `--timeout` flag.
    pub timeout: Option<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            timeout: Some("5m".to_owned()),
        }
    }
}

/// Timeout table overrides, in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for commands that match no other entry.
    pub default_secs: Option<u64>,
    /// Budgets keyed by program name.
    pub commands: BTreeMap<String, u64>,
    /// Budgets keyed by `"program subcommand"`.
    pub subcommands: BTreeMap<String, u64>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.tessera.toml` from `root` when present, then apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if an existing config file cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            debug!("Loading configuration from {}", path.display());
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_with(|key| env::var(key).ok());
        Ok(config)
    }

    /// Applies `TESSERA_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty());

        if let Some(value) = read("BUILD_TAGS") {
            self.build.tags = split_list(&value);
        }
        if let Some(value) = read("VERBOSE")
            && let Some(flag) = parse_flag("VERBOSE", &value)
        {
            self.build.verbose = flag;
            self.test.verbose = flag;
        }
        if let Some(value) = read("TEST_RACE")
            && let Some(flag) = parse_flag("TEST_RACE", &value)
        {
            self.test.race = flag;
        }
        if let Some(value) = read("PARALLEL") {
            match value.trim().parse() {
                Ok(parallel) => self.test.parallel = parallel,
                Err(err) => warn!("Ignoring {ENV_PREFIX}PARALLEL={value}: {err}"),
            }
        }
        if let Some(value) = read("TEST_TIMEOUT") {
            if parse_go_duration(&value).is_some() {
                self.test.timeout = Some(value.trim().to_owned());
            } else {
                warn!("Ignoring {ENV_PREFIX}TEST_TIMEOUT={value}: not a duration");
            }
        }
        if let Some(value) = read("AUTO_DISCOVER_BUILD_TAGS")
            && let Some(flag) = parse_flag("AUTO_DISCOVER_BUILD_TAGS", &value)
        {
            self.test.auto_discover_build_tags = flag;
        }
        if let Some(value) = read("AUTO_DISCOVER_BUILD_TAGS_EXCLUDE") {
            self.test.auto_discover_build_tags_exclude = split_list(&value);
        }
        if let Some(value) = read("TEST_EXCLUDE_MODULES") {
            self.test.exclude_modules = split_list(&value);
        }
    }

    /// Tags passed to every invocation, build tags first, without duplicates.
    pub fn extra_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.build.tags.iter().chain(&self.test.tags) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    fn validate(&self) -> Result<()> {
        if let Some(timeout) = &self.test.timeout
            && parse_go_duration(timeout).is_none()
        {
            return Err(Error::Config(format!("test.timeout {timeout:?} is not a duration")));
        }
        if let Some(timeout) = &self.lint.timeout
            && parse_go_duration(timeout).is_none()
        {
            return Err(Error::Config(format!("lint.timeout {timeout:?} is not a duration")));
        }
        if self.test.cover_mode.trim().is_empty() {
            return Err(Error::Config("test.cover_mode must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// Splits a comma separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_flag(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("Ignoring {ENV_PREFIX}{name}={other}: expected a boolean");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::write;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.test.cover_mode, "atomic");
        assert!(config.test.auto_discover_build_tags);
        assert_eq!(config.test.timeout.as_deref(), Some("10m"));
        assert_eq!(config.lint.timeout.as_deref(), Some("5m"));
        assert!(config.extra_tags().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        write(
            &path,
            r#"
[build]
tags = ["integration"]

[test]
parallel = 4
cover_mode = "count"
exclude_modules = ["tools"]

[timeouts]
default_secs = 45

[timeouts.subcommands]
"go test" = 1200
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.build.tags, vec!["integration"]);
        assert_eq!(config.test.parallel, 4);
        assert_eq!(config.test.cover_mode, "count");
        assert_eq!(config.test.exclude_modules, vec!["tools"]);
        assert_eq!(config.timeouts.default_secs, Some(45));
        assert_eq!(config.timeouts.subcommands.get("go test"), Some(&1200));
        // untouched sections keep their defaults
        assert_eq!(config.test.timeout.as_deref(), Some("10m"));
    }

    #[test]
    fn test_load_rejects_bad_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        write(&path, "[test]\ntimeout = \"soon\"\n").unwrap();
        let result = Config::load_from_file(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.test.cover_mode, "atomic");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_with(lookup_from(&[
            ("TESSERA_BUILD_TAGS", "integration, e2e"),
            ("TESSERA_VERBOSE", "true"),
            ("TESSERA_TEST_RACE", "1"),
            ("TESSERA_PARALLEL", "8"),
            ("TESSERA_TEST_TIMEOUT", "30m"),
            ("TESSERA_AUTO_DISCOVER_BUILD_TAGS", "false"),
            ("TESSERA_AUTO_DISCOVER_BUILD_TAGS_EXCLUDE", " slow ,  , windows "),
            ("TESSERA_TEST_EXCLUDE_MODULES", "tools,docs"),
        ]));

        assert_eq!(config.build.tags, vec!["integration", "e2e"]);
        assert!(config.build.verbose);
        assert!(config.test.verbose);
        assert!(config.test.race);
        assert_eq!(config.test.parallel, 8);
        assert_eq!(config.test.timeout.as_deref(), Some("30m"));
        assert!(!config.test.auto_discover_build_tags);
        assert_eq!(config.test.auto_discover_build_tags_exclude, vec!["slow", "windows"]);
        assert_eq!(config.test.exclude_modules, vec!["tools", "docs"]);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_with(lookup_from(&[
            ("TESSERA_PARALLEL", "many"),
            ("TESSERA_TEST_TIMEOUT", "forever"),
            ("TESSERA_TEST_RACE", "maybe"),
        ]));
        assert_eq!(config.test.parallel, 0);
        assert_eq!(config.test.timeout.as_deref(), Some("10m"));
        assert!(!config.test.race);
    }

    #[test]
    fn test_extra_tags_deduplicates() {
        let mut config = Config::default();
        config.build.tags = vec!["a".to_owned(), "b".to_owned()];
        config.test.tags = vec!["b".to_owned(), "c".to_owned()];
        assert_eq!(config.extra_tags(), vec!["a", "b", "c"]);
    }
}
