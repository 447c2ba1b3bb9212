use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tessera_core::{TimeoutConfig, parse_go_duration};

const MINUTE: u64 = 60;

/// Extra time granted on top of a timeout the command enforces itself.
const FLAG_MARGIN: Duration = Duration::from_secs(MINUTE);

/// Per-command timeout lookup.
///
/// Lookup order: the `"program first-arg"` subcommand entry, then the program
/// entry, then the default. Entries registered with a timeout flag use the
/// command's own flag value plus a safety margin when the flag is present.
#[derive(Debug, Clone)]
pub struct TimeoutTable {
    default: Duration,
    commands: HashMap<String, Duration>,
    subcommands: HashMap<String, Duration>,
    timeout_flags: HashMap<String, String>,
}

impl Default for TimeoutTable {
    fn default() -> Self {
        let commands = [
            ("golangci-lint", 20 * MINUTE),
            ("goreleaser", 30 * MINUTE),
            ("staticcheck", 3 * MINUTE),
            ("gosec", 3 * MINUTE),
            ("govulncheck", 3 * MINUTE),
            ("mage", 3 * MINUTE),
        ];
        let subcommands = [
            ("go test", 10 * MINUTE),
            ("go install", 5 * MINUTE),
            ("go get", 5 * MINUTE),
            ("go mod", 5 * MINUTE),
            ("go build", 3 * MINUTE),
            ("go run", 3 * MINUTE),
            ("go vet", MINUTE),
            ("go list", MINUTE),
        ];
        let timeout_flags = [("golangci-lint", "--timeout"), ("go test", "-timeout")];

        Self {
            default: Duration::from_secs(30),
            commands: seconds_map(&commands),
            subcommands: seconds_map(&subcommands),
            timeout_flags: timeout_flags
                .iter()
                .map(|(key, flag)| ((*key).to_owned(), (*flag).to_owned()))
                .collect(),
        }
    }
}

impl TimeoutTable {
    /// The built-in table with configured overrides applied on top.
    pub fn from_config(config: &TimeoutConfig) -> Self {
        let mut table = Self::default();
        if let Some(secs) = config.default_secs {
            table.default = Duration::from_secs(secs);
        }
        for (name, secs) in &config.commands {
            table.commands.insert(name.clone(), Duration::from_secs(*secs));
        }
        for (key, secs) in &config.subcommands {
            table.subcommands.insert(key.clone(), Duration::from_secs(*secs));
        }
        table
    }

    /// Replace the fallback timeout.
    #[must_use]
    pub fn with_default(mut self, timeout: Duration) -> Self {
        self.default = timeout;
        self
    }

    /// Set the timeout for every invocation of `program`.
    #[must_use]
    pub fn with_command(mut self, program: &str, timeout: Duration) -> Self {
        self.commands.insert(program.to_owned(), timeout);
        self
    }

    /// Set the timeout for `program subcommand`.
    #[must_use]
    pub fn with_subcommand(mut self, program: &str, subcommand: &str, timeout: Duration) -> Self {
        self.subcommands
            .insert(format!("{program} {subcommand}"), timeout);
        self
    }

    /// The fallback timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default
    }

    /// Timeout for running `program` with `args`.
    pub fn resolve(&self, program: &str, args: &[String]) -> Duration {
        let name = Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program);
        let subcommand_key = args.first().map(|first| format!("{name} {first}"));

        for key in subcommand_key.iter().map(String::as_str).chain([name]) {
            if let Some(from_flag) = self.flag_timeout(key, args) {
                return from_flag;
            }
        }

        if let Some(timeout) = subcommand_key
            .as_ref()
            .and_then(|key| self.subcommands.get(key))
        {
            return *timeout;
        }
        self.commands.get(name).copied().unwrap_or(self.default)
    }

    fn flag_timeout(&self, key: &str, args: &[String]) -> Option<Duration> {
        let flag = self.timeout_flags.get(key)?;
        let inline = format!("{flag}=");
        let value = args.iter().enumerate().find_map(|(index, arg)| {
            if arg == flag {
                args.get(index + 1).map(String::as_str)
            } else {
                arg.strip_prefix(&inline)
            }
        })?;
        parse_go_duration(value).map(|timeout| timeout + FLAG_MARGIN)
    }
}

fn seconds_map(entries: &[(&str, u64)]) -> HashMap<String, Duration> {
    entries
        .iter()
        .map(|(key, secs)| ((*key).to_owned(), Duration::from_secs(*secs)))
        .collect()
}
