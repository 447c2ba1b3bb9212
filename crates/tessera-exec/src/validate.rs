use std::collections::BTreeSet;

use tessera_core::{Error, Result};

use crate::CommandSpec;

/// Substrings that only make sense to a shell.
const DANGEROUS_PATTERNS: &[&str] = &["$(", "`", "&&", "||", ";", ">", "<", "${IFS}"];

/// Commands that make a `|` look like a pipeline rather than a regex alternation.
const PIPE_TARGETS: &[&str] = &[
    "cat", "rm", "wget", "curl", "bash", "sh", "nc", "python", "perl", "ruby", "chmod", "chown",
    "mv", "cp", "dd", "head", "tail", "grep", "awk", "sed", "xargs", "find", "exec", "eval",
    "source", "env", "sudo",
];

const REGEX_CHARS: &[char] = &['^', '$', '[', ']', '(', ')', '+', '*', '?', '.', '{', '}', '\\'];

/// Checks a command before it is spawned.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    allowed: BTreeSet<String>,
}

impl CommandValidator {
    /// A validator that accepts any program name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict execution to the given program names.
    #[must_use]
    pub fn allow<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(programs.into_iter().map(Into::into));
        self
    }

    /// Validate program name and every argument.
    ///
    /// # Errors
    /// Returns [`Error::CommandRejected`] describing the first problem found.
    pub fn validate(&self, spec: &CommandSpec) -> Result<()> {
        let program = spec.program();
        let reject = |reason: String| Error::CommandRejected {
            command: program.to_owned(),
            reason,
        };

        if program.trim().is_empty() {
            return Err(reject("empty program name".to_owned()));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(program) {
            return Err(reject("not in the allowed command list".to_owned()));
        }
        if program.contains("..") {
            return Err(reject("program name contains path traversal".to_owned()));
        }
        for arg in spec.get_args() {
            validate_arg(arg).map_err(|reason| reject(format!("argument {arg:?}: {reason}")))?;
        }
        Ok(())
    }
}

/// Checks a single argument for shell metacharacters.
///
/// A `|` is tolerated inside regex-looking or URL arguments as long as it is
/// not followed by a shell command name.
///
/// # Errors
/// Returns a short description of the offending pattern.
pub fn validate_arg(arg: &str) -> core::result::Result<(), String> {
    if arg.contains('\0') {
        return Err("contains a NUL byte".to_owned());
    }
    if let Some(pattern) = DANGEROUS_PATTERNS
        .iter()
        .find(|pattern| arg.contains(**pattern))
    {
        return Err(format!("potentially dangerous pattern '{pattern}'"));
    }

    if let Some(index) = arg.find('|') {
        let is_regex = arg.contains(REGEX_CHARS);
        let is_url = arg.starts_with("http://") || arg.starts_with("https://");
        if !is_regex && !is_url {
            return Err("potentially dangerous pattern '|'".to_owned());
        }
        let after = arg[index + 1..].trim_start();
        let piped_command = PIPE_TARGETS.iter().any(|command| {
            after == *command
                || after
                    .strip_prefix(command)
                    .is_some_and(|rest| rest.starts_with(' '))
        });
        if is_regex && piped_command {
            return Err("potentially dangerous pattern '|'".to_owned());
        }
    }
    Ok(())
}
