//! # Courier Console
//!
//! Command-line front end for merchants and drivers.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize tracing (stderr, RUST_LOG aware)                         │
//! │  2. Parse the subcommand (clap; exits with usage on bad input)          │
//! │  3. Load config: courier.toml + COURIER_* environment                   │
//! │  4. Open storage and hydrate the saved session                          │
//! │  5. Run the subcommand                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//! ```text
//! courier login ana@example.com secret
//! courier orders
//! courier accept 42
//! courier watch          # until Ctrl-C
//! courier report 33.68 73.04
//! ```

mod commands;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use courier_sync::{ClientConfig, ClientError, CourierClient};

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let config = ClientConfig::load_or_default(None);
    let client = match CourierClient::open(config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to open client");
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    let result = commands::run(&client, cli.command).await;
    client.database().close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ClientError>() {
                Some(client_err) => {
                    error!(error = %client_err, kind = %client_err.kind(), "Command failed");
                    eprintln!("{}", client_err.user_message());
                }
                None => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=courier_sync=trace` - Trace the sync layer only
/// - Default: INFO, DEBUG for courier crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,courier=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Courier console starting");
}
