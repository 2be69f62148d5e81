//! Command-line interface definition
//!
//! Lives in the library so documentation tooling can render it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MigrateConfig;

#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about = "Export tables to chunk files and bulk-load them elsewhere")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML); FERRY__* environment variables override it
    #[arg(short, long, global = true, env = "FERRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Export tables into chunk files and upload them
    Export,

    /// Download chunk files and bulk-load them into the destination
    Load {
        /// Skip the schema bootstrap script even if configured
        #[arg(long)]
        skip_bootstrap: bool,

        /// Override the number of load workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Export, then load
    Migrate,
}

impl Command {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut MigrateConfig) {
        if let Command::Load {
            skip_bootstrap,
            workers,
        } = self
        {
            if *skip_bootstrap {
                config.load.bootstrap = false;
            }
            if let Some(workers) = workers {
                config.load.workers = *workers;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load_with_overrides() {
        let cli = Cli::try_parse_from([
            "ferry",
            "load",
            "--skip-bootstrap",
            "--workers",
            "6",
            "--config",
            "ferry.toml",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Load {
                skip_bootstrap: true,
                workers: Some(6)
            }
        );
        assert_eq!(cli.config, Some(PathBuf::from("ferry.toml")));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_export_takes_no_load_flags() {
        assert!(Cli::try_parse_from(["ferry", "export", "--workers", "2"]).is_err());
    }
}
