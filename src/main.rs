//! relay-manager
//!
//! Supervises a Nostr relay process, keeps its access lists in step with
//! the manager's database, and exposes an authenticated admin API.
//!
//! # Architecture Overview
//!
//! ```text
//!     relay-cli / operator
//!            │ HTTP (Bearer)
//!            ▼
//!     ┌─────────────┐     ┌──────────────────────┐     ┌──────────────┐
//!     │  admin API  │────▶│  SupervisorFacade    │────▶│  supervisor  │──▶ relay process
//!     └─────────────┘     │                      │     │    actor     │    (start/stop/HUP)
//!                         │                      │     └──────────────┘
//!                         │                      │     ┌──────────────┐
//!                         │                      │────▶│ access sync  │──▶ access.json
//!                         └──────────────────────┘     └──────┬───────┘
//!                                                             ▼
//!                                                      relay config.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use relay_manager::config::loader::load_config;
use relay_manager::lifecycle::startup;

#[derive(Parser)]
#[command(name = "relay-manager")]
#[command(about = "Supervisor and access-list manager for a Nostr relay", long_about = None)]
struct Cli {
    /// Manager configuration file.
    #[arg(short, long, default_value = "manager.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("relay-manager: {e}");
            return ExitCode::FAILURE;
        }
    };

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "relay-manager exited with an error");
            eprintln!("relay-manager: {e}");
            ExitCode::FAILURE
        }
    }
}
