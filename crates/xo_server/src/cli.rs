//! Command-line interface for xo_server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Two-player tic-tac-toe match server
#[derive(Parser, Debug)]
#[command(name = "xo_server")]
#[command(about = "Pairs players into tic-tac-toe matches over WebSockets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the match server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config and XO_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config and XO_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["xo_server", "serve", "--port", "9001", "--host", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Command::Serve { config, host, port } => {
                assert_eq!(config, None);
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9001));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["xo_server"]).is_err());
    }
}
