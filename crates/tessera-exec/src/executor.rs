use std::env;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tessera_core::{Canceled, DeadlineExceeded, Error, Result, format_duration};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{CancelSignal, CommandSpec, CommandValidator, EnvironmentFilter, TimeoutTable};

/// Runs external commands.
///
/// Implementations must apply the command's directory and environment to the
/// child process only.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the command with output streamed to this process's stdout/stderr.
    ///
    /// # Errors
    /// Returns an error if the command is rejected, cannot start, times out,
    /// is canceled or exits unsuccessfully.
    async fn run(&self, spec: &CommandSpec) -> Result<()>;

    /// Run the command and return its standard output with trailing whitespace trimmed.
    ///
    /// # Errors
    /// Same as [`Executor::run`].
    async fn output(&self, spec: &CommandSpec) -> Result<String>;
}

/// Process-backed executor with validation, secret filtering, adaptive
/// timeouts and cancellation. Never retries.
#[derive(Debug, Clone, Default)]
pub struct SecureExecutor {
    timeouts: TimeoutTable,
    validator: CommandValidator,
    environment: EnvironmentFilter,
    cancel: CancelSignal,
    dry_run: bool,
}

impl SecureExecutor {
    /// Create an executor using `timeouts`.
    pub fn new(timeouts: TimeoutTable) -> Self {
        Self {
            timeouts,
            ..Self::default()
        }
    }

    /// Replace the command validator.
    #[must_use]
    pub fn with_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the environment filter.
    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentFilter) -> Self {
        self.environment = environment;
        self
    }

    /// Observe `cancel` while commands run.
    #[must_use]
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Log commands instead of running them.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The timeout table in use.
    pub fn timeouts(&self) -> &TimeoutTable {
        &self.timeouts
    }

    async fn execute(&self, spec: &CommandSpec, capture: bool) -> Result<String> {
        self.validator.validate(spec)?;

        let budget = self.timeouts.resolve(spec.program(), spec.get_args());
        if self.dry_run {
            info!("[dry-run] {spec}");
            return Ok(String::new());
        }
        if self.cancel.is_cancelled() {
            return Err(canceled(spec));
        }

        debug!(
            "Running {spec} in {} (timeout {})",
            spec.dir()
                .map_or_else(|| ".".to_owned(), |dir| dir.display().to_string()),
            format_duration(budget)
        );

        let mut command = self.build_command(spec, capture);
        let child = command.spawn().map_err(|source| Error::Spawn {
            command: spec.program().to_owned(),
            source,
        })?;

        let output = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(canceled(spec)),
            finished = timeout(budget, child.wait_with_output()) => match finished {
                Ok(output) => output?,
                Err(_) => return Err(timed_out(spec, budget)),
            },
        };

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_owned());
        }

        let mut captured = String::from_utf8_lossy(&output.stderr).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stdout));
        Err(Error::ExecutionFailed {
            command: spec.program().to_owned(),
            args: spec.get_args().to_vec(),
            dir: spec.dir().map(ToOwned::to_owned),
            status: describe_status(output.status),
            output: captured.trim_end().to_owned(),
        })
    }

    fn build_command(&self, spec: &CommandSpec, capture: bool) -> Command {
        let mut command = Command::new(spec.program());
        command
            .args(spec.get_args())
            .env_clear()
            .envs(self.environment.apply(spec.program(), env::vars_os()))
            .envs(spec.get_env().iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = spec.dir() {
            command.current_dir(dir);
        }
        if capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        command
    }
}

#[async_trait]
impl Executor for SecureExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<()> {
        self.execute(spec, false).await.map(|_| ())
    }

    async fn output(&self, spec: &CommandSpec) -> Result<String> {
        self.execute(spec, true).await
    }
}

fn timed_out(spec: &CommandSpec, budget: Duration) -> Error {
    Error::ExecutionTimeout {
        command: spec.program().to_owned(),
        dir: spec.dir().map(ToOwned::to_owned),
        timeout: budget,
        source: DeadlineExceeded,
    }
}

fn canceled(spec: &CommandSpec) -> Error {
    Error::ExecutionCanceled {
        command: spec.program().to_owned(),
        dir: spec.dir().map(ToOwned::to_owned),
        source: Canceled,
    }
}

fn describe_status(status: ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_owned(),
        |code| format!("exit status {code}"),
    )
}
