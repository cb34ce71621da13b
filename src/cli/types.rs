//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::discovery::DiscoveryArgs;

#[derive(Parser, Debug)]
#[command(name = "dpi-console")]
#[command(about = "Operator console for the DPI-circumvention daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .dpi-console/
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Strategy discovery sessions
    Discovery(DiscoveryArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::discovery::DiscoveryCommands;
    use crate::domain::models::DiscoveryPhase;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_with_options() {
        let cli = Cli::try_parse_from([
            "dpi-console",
            "--json",
            "discovery",
            "start",
            "youtube.com",
            "--max-concurrent",
            "4",
            "--skip-phase",
            "dns_detection",
            "--preset",
            "tcp_frag",
            "--preset",
            "fake_sni",
            "--watch",
        ])
        .unwrap();

        assert!(cli.json);
        let Commands::Discovery(args) = cli.command;
        match args.command {
            DiscoveryCommands::Start(start) => {
                assert_eq!(start.target, "youtube.com");
                assert_eq!(start.max_concurrent, Some(4));
                assert_eq!(start.skip_phase, vec![DiscoveryPhase::DnsDetection]);
                assert_eq!(start.preset, vec!["tcp_frag", "fake_sni"]);
                assert!(start.watch);
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_phase_is_rejected() {
        let result = Cli::try_parse_from([
            "dpi-console",
            "discovery",
            "start",
            "youtube.com",
            "--skip-phase",
            "warp_drive",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["dpi-console", "discovery", "status", "--config", "/tmp/c.yaml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
    }
}
