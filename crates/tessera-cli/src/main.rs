//! `tessera` - build, test and coverage runner for multi-module Go workspaces.
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

use std::io::stderr;
use std::process::ExitCode;

use clap::Parser as _;
use cli::Cli;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, registry, util::SubscriberInitExt as _};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> ExitCode {
    registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tessera=info")))
        .with(fmt::layer().with_writer(stderr))
        .init();

    let cli = Cli::parse();
    match handlers::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
