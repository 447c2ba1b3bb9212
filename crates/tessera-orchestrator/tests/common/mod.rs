//! Shared fixtures for orchestrator tests.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tessera_core::{Canceled, Error, Module, Result};
use tessera_exec::{CommandSpec, Executor};

/// What a scripted command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit with status 1.
    Fail,
    /// Behave as if the caller canceled.
    Cancel,
}

type Matcher = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;
type ProfileWriter = Box<dyn Fn(&Path) -> String + Send + Sync>;

/// Executor double that records every command and scripts outcomes.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    rules: Vec<(Matcher, Outcome)>,
    profile_writer: Option<ProfileWriter>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands matching `matcher` produce `outcome`.
    #[must_use]
    pub fn when<F>(mut self, matcher: F, outcome: Outcome) -> Self
    where
        F: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.rules.push((Box::new(matcher), outcome));
        self
    }

    /// Successful coverage runs write the profile named by `-coverprofile`
    /// with the content `writer` returns for the module directory.
    #[must_use]
    pub fn writing_profiles<F>(mut self, writer: F) -> Self
    where
        F: Fn(&Path) -> String + Send + Sync + 'static,
    {
        self.profile_writer = Some(Box::new(writer));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// `dir :: args` for every call, with dirs relative to `root`.
    pub fn call_lines(&self, root: &Path) -> Vec<String> {
        self.calls()
            .iter()
            .map(|spec| {
                let dir = spec
                    .dir()
                    .and_then(|dir| dir.strip_prefix(root).ok())
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default();
                let dir = if dir.is_empty() { ".".to_owned() } else { dir };
                format!("{dir} :: {} {}", spec.program(), spec.get_args().join(" "))
            })
            .collect()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<()> {
        self.calls.lock().unwrap().push(spec.clone());

        let scripted = self
            .rules
            .iter()
            .find(|(matcher, _)| matcher(spec))
            .map(|(_, outcome)| *outcome);
        match scripted {
            Some(Outcome::Fail) => {
                return Err(Error::ExecutionFailed {
                    command: spec.program().to_owned(),
                    args: spec.get_args().to_vec(),
                    dir: spec.dir().map(Path::to_path_buf),
                    status: "exit status 1".to_owned(),
                    output: String::new(),
                });
            }
            Some(Outcome::Cancel) => {
                return Err(Error::ExecutionCanceled {
                    command: spec.program().to_owned(),
                    dir: spec.dir().map(Path::to_path_buf),
                    source: Canceled,
                });
            }
            None => {}
        }

        if let (Some(writer), Some(dir)) = (&self.profile_writer, spec.dir()) {
            let profile = spec
                .get_args()
                .iter()
                .find_map(|arg| arg.strip_prefix("-coverprofile="));
            if let Some(name) = profile {
                write(dir.join(name), writer(dir)).unwrap();
            }
        }
        Ok(())
    }

    async fn output(&self, spec: &CommandSpec) -> Result<String> {
        self.run(spec).await.map(|()| String::new())
    }
}

/// Whether the command runs in a directory ending with `relative`.
pub fn in_dir(spec: &CommandSpec, relative: &str) -> bool {
    spec.dir().is_some_and(|dir| dir.ends_with(relative))
}

/// Whether the command passes `-tags` including `tag`.
pub fn with_tag(spec: &CommandSpec, tag: &str) -> bool {
    let args = spec.get_args();
    args.iter()
        .position(|arg| arg == "-tags")
        .and_then(|index| args.get(index + 1))
        .is_some_and(|tags| tags.split(',').any(|candidate| candidate == tag))
}

/// Writes `content` to `relative` under `root`, creating parent directories.
pub fn put(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).unwrap();
    }
    write(path, content).unwrap();
}

/// Module records for `(relative path, module id)` pairs under `root`.
pub fn modules(root: &Path, entries: &[(&str, &str)]) -> Vec<Module> {
    entries
        .iter()
        .map(|(relative, id)| {
            let path: PathBuf = if *relative == "." {
                root.to_path_buf()
            } else {
                root.join(relative)
            };
            create_dir_all(&path).unwrap();
            Module::new(root, path, (*id).to_owned())
        })
        .collect()
}

/// Shares an executor with the code under test while keeping a handle.
pub fn shared(executor: RecordingExecutor) -> (Arc<RecordingExecutor>, Arc<dyn Executor>) {
    let executor = Arc::new(executor);
    let dynamic: Arc<dyn Executor> = Arc::clone(&executor) as Arc<dyn Executor>;
    (executor, dynamic)
}
