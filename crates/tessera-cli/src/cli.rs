use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera_orchestrator::RunMode;

/// Command-line arguments for the `tessera` binary.
#[derive(Debug, Parser)]
#[command(name = "tessera")]
#[command(about = "Build, test and coverage runner for multi-module Go workspaces", long_about = None)]
pub struct Cli {
    /// Workspace root directory.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Log commands instead of running them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level operations.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run tests in every module, once without tags and once per build tag.
    Test {
        /// Run mode: unit, short, race, cover or cover-race.
        #[arg(default_value = "unit")]
        mode: RunMode,

        /// Extra `go test` flags, passed after `--`.
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Run `go build ./...` in every module.
    Build,

    /// Run `go vet ./...` in every module.
    Vet,

    /// Run `golangci-lint run ./...` in every module.
    Lint,

    /// List modules in dependency order.
    Modules,

    /// List build tags found in the workspace.
    Tags,

    /// Coverage profile utilities.
    Coverage {
        /// Coverage action.
        #[command(subcommand)]
        action: CoverageCommand,
    },
}

/// `tessera coverage` subcommands.
#[derive(Debug, Subcommand)]
pub enum CoverageCommand {
    /// Merge coverage profiles into one file.
    Merge {
        /// Profiles to merge, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarise the merged workspace profile.
    Report {
        /// Also write `coverage.html` at the workspace root.
        #[arg(long)]
        html: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_and_extra_args() {
        let cli = Cli::try_parse_from(["tessera", "test", "cover-race", "--", "-run", "TestFoo"]).unwrap();
        let Commands::Test { mode, extra } = cli.command else {
            panic!("expected test command");
        };
        assert_eq!(mode, RunMode::CoverageRace);
        assert_eq!(extra, vec!["-run", "TestFoo"]);
    }

    #[test]
    fn test_default_mode_is_unit() {
        let cli = Cli::try_parse_from(["tessera", "test"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Test {
                mode: RunMode::Unit,
                ..
            }
        ));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["tessera", "test", "fuzz"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tessera", "build", "--root", "/work", "--dry-run"]).unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.root, PathBuf::from("/work"));
        assert!(matches!(cli.command, Commands::Build));
    }

    #[test]
    fn test_coverage_merge_requires_files() {
        assert!(Cli::try_parse_from(["tessera", "coverage", "merge", "-o", "out.txt"]).is_err());
        let cli = Cli::try_parse_from(["tessera", "coverage", "merge", "a.txt", "b.txt", "-o", "out.txt"]).unwrap();
        let Commands::Coverage {
            action: CoverageCommand::Merge { files, output },
        } = cli.command
        else {
            panic!("expected coverage merge");
        };
        assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert_eq!(output, PathBuf::from("out.txt"));
    }
}
