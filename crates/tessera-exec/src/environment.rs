use std::collections::BTreeMap;
use std::ffi::OsString;

/// Variable name prefixes treated as secrets.
const SENSITIVE_PREFIXES: &[&str] = &[
    "AWS_SECRET",
    "GITHUB_TOKEN",
    "GITLAB_TOKEN",
    "NPM_TOKEN",
    "DOCKER_PASSWORD",
    "DATABASE_PASSWORD",
    "API_KEY",
    "SECRET",
    "PRIVATE_KEY",
];

/// Removes secrets from the environment a child inherits.
///
/// A variable is sensitive when its upper-cased name equals a sensitive prefix
/// or continues it with `_`. Individual programs may be allowed to see
/// specific sensitive variables.
#[derive(Debug, Clone)]
pub struct EnvironmentFilter {
    enabled: bool,
    allowed: BTreeMap<String, Vec<String>>,
}

impl Default for EnvironmentFilter {
    fn default() -> Self {
        let mut allowed = BTreeMap::new();
        allowed.insert(
            "goreleaser".to_owned(),
            vec![
                "GITHUB_TOKEN".to_owned(),
                "GITLAB_TOKEN".to_owned(),
                "GITEA_TOKEN".to_owned(),
            ],
        );
        Self {
            enabled: true,
            allowed,
        }
    }
}

impl EnvironmentFilter {
    /// A filter that passes everything through.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            allowed: BTreeMap::new(),
        }
    }

    /// Let `program` see `variable` even though it is sensitive.
    #[must_use]
    pub fn allow_for(mut self, program: &str, variable: &str) -> Self {
        self.allowed
            .entry(program.to_owned())
            .or_default()
            .push(variable.to_ascii_uppercase());
        self
    }

    /// Whether `name` would be withheld from `program`.
    pub fn is_withheld(&self, program: &str, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let upper = name.to_ascii_uppercase();
        let sensitive = SENSITIVE_PREFIXES.iter().any(|prefix| {
            upper
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
        });
        if !sensitive {
            return false;
        }
        !self
            .allowed
            .get(program)
            .is_some_and(|names| names.contains(&upper))
    }

    /// Filter `vars` for a child running `program`.
    ///
    /// Variables whose names are not valid UTF-8 are passed through untouched.
    pub fn apply<I>(&self, program: &str, vars: I) -> Vec<(OsString, OsString)>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        vars.into_iter()
            .filter(|(name, _)| {
                name.to_str()
                    .is_none_or(|name| !self.is_withheld(program, name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(names: &[&str]) -> Vec<(OsString, OsString)> {
        names
            .iter()
            .map(|name| (OsString::from(name), OsString::from("value")))
            .collect()
    }

    fn names(vars: &[(OsString, OsString)]) -> Vec<String> {
        vars.iter()
            .map(|(name, _)| name.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_sensitive_variables_removed() {
        let filter = EnvironmentFilter::default();
        let kept = filter.apply(
            "go",
            pairs(&["PATH", "HOME", "GITHUB_TOKEN", "AWS_SECRET_ACCESS_KEY", "API_KEY", "secret"]),
        );
        assert_eq!(names(&kept), vec!["PATH", "HOME"]);
    }

    #[test]
    fn test_prefix_must_end_at_boundary() {
        let filter = EnvironmentFilter::default();
        assert!(!filter.is_withheld("go", "SECRETARY"));
        assert!(!filter.is_withheld("go", "API_KEYRING"));
        assert!(filter.is_withheld("go", "SECRET_THING"));
        assert!(filter.is_withheld("go", "github_token"));
    }

    #[test]
    fn test_program_specific_allowance() {
        let filter = EnvironmentFilter::default();
        assert!(!filter.is_withheld("goreleaser", "GITHUB_TOKEN"));
        assert!(filter.is_withheld("goreleaser", "NPM_TOKEN"));

        let custom = EnvironmentFilter::default().allow_for("deploy", "npm_token");
        assert!(!custom.is_withheld("deploy", "NPM_TOKEN"));
    }

    #[test]
    fn test_disabled_keeps_everything() {
        let kept = EnvironmentFilter::disabled().apply("go", pairs(&["GITHUB_TOKEN", "PATH"]));
        assert_eq!(kept.len(), 2);
    }
}
