//! Subprocess execution for tessera.
//!
//! Commands are described by a [`CommandSpec`] and run through an
//! [`Executor`]. The [`SecureExecutor`] validates arguments, strips secrets
//! from the inherited environment, applies a per-command timeout from the
//! [`TimeoutTable`] and honours caller cancellation. Working directory and
//! extra environment are set on the child only, never on this process.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

/// Cooperative cancellation shared between the caller and running commands.
pub mod cancel;
/// Command descriptions.
pub mod command;
/// Inherited environment filtering.
pub mod environment;
/// The executor trait and its process-backed implementation.
pub mod executor;
/// Adaptive per-command timeouts.
pub mod timeout;
/// Argument and program validation.
pub mod validate;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use command::CommandSpec;
pub use environment::EnvironmentFilter;
pub use executor::{Executor, SecureExecutor};
pub use timeout::TimeoutTable;
pub use validate::{CommandValidator, validate_arg};
