// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - campaign delivery scheduler.
//!
//! This is the binary entry point for the scheduler daemon.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use courier_config::diagnostic::ConfigError;
use courier_config::model::CourierConfig;

/// Courier - campaign delivery scheduler.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reconciliation loop and the status worker until SIGINT/SIGTERM.
    Serve,
    /// Run one reconciliation pass and wait for the campaigns it dispatched.
    Tick,
    /// Run one delivery-status pass.
    ReconcileStatus,
    /// Validate configuration and check the environment.
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> Result<CourierConfig, Vec<ConfigError>> {
    match path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Tick) => serve::run_tick(config).await,
        Some(Commands::ReconcileStatus) => serve::run_status_pass(config).await,
        Some(Commands::CheckConfig) => check::run_check_config(&config).await,
        None => {
            println!("courier: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands_and_config_path() {
        let cli = Cli::try_parse_from(["courier", "--config", "/tmp/c.toml", "reconcile-status"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.toml")));
        assert!(matches!(cli.command, Some(Commands::ReconcileStatus)));

        let cli = Cli::try_parse_from(["courier", "check-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, "[scheduler]\ninterval_secs = 15\n").unwrap();

        let config = load_config(Some(&path)).expect("config should load");
        assert_eq!(config.scheduler.interval_secs, 15);
    }

    #[test]
    fn unknown_key_in_explicit_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, "[scheduler]\nintervl_secs = 15\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}
