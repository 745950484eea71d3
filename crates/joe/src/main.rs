// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Joe - query optimization assistant on thin database clones.
//!
//! This is the binary entry point.

mod assembly;
mod serve;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use joe_config::JoeConfig;

/// Joe - query optimization assistant on thin database clones.
#[derive(Parser, Debug)]
#[command(name = "joe", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the assistant with every configured transport.
    Serve {
        /// Config file layered over the default lookup paths.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Validate the configuration and report problems.
    CheckConfig {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn load(path: Option<&Path>) -> Option<JoeConfig> {
    match joe_config::load_and_validate(path) {
        Ok(config) => Some(config),
        Err(errors) => {
            joe_config::render_errors(&errors);
            None
        }
    }
}

fn workspace_count(config: &JoeConfig) -> usize {
    config
        .channel_mapping
        .communication_types
        .values()
        .map(Vec::len)
        .sum()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let Some(config) = load(config.as_deref()) else {
                return ExitCode::FAILURE;
            };
            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("joe: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::CheckConfig { config } => {
            let Some(config) = load(config.as_deref()) else {
                return ExitCode::FAILURE;
            };
            println!(
                "joe: configuration is valid ({} workspaces, {} dblab servers)",
                workspace_count(&config),
                config.channel_mapping.dblab_servers.len()
            );
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_accepts_config_path() {
        let cli = Cli::try_parse_from(["joe", "serve", "--config", "/etc/joe/custom.toml"]).unwrap();
        match cli.command {
            Commands::Serve { config } => {
                assert_eq!(config, Some(PathBuf::from("/etc/joe/custom.toml")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn check_config_is_kebab_case() {
        let cli = Cli::try_parse_from(["joe", "check-config"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig { config: None }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["joe"]).is_err());
    }

    #[test]
    fn workspaces_are_counted_across_transports() {
        let config = joe_config::load_config_from_str(
            r#"
[[channel_mapping.communication_types.slack]]
name = "a"
[[channel_mapping.communication_types.slack]]
name = "b"
[[channel_mapping.communication_types.webui]]
name = "web"
"#,
        )
        .unwrap();
        assert_eq!(workspace_count(&config), 3);
    }

    #[test]
    fn invalid_config_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joe.toml");
        std::fs::write(&path, "[app]\nprot = 1\n").unwrap();
        assert!(load(Some(&path)).is_none());
    }
}
