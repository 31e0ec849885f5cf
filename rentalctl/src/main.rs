//! rentalctl - operator CLI for the rental accounts database.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account_service_lib::config::AccountServiceConfig;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AccountServiceConfig::from_env();

    // Verbose mode sets debug level
    init_tracing(cli.verbose, &config.service.log_level);
    tracing::debug!(service = %config.service.service_name, ?config, "Configuration loaded");

    let result = match cli.command {
        Commands::Migrate { action } => commands::migrate::execute(action, config).await,
        Commands::Roles { action } => commands::roles::execute(action, config).await,
        Commands::Users { action } => commands::users::execute(action, config).await,
    };

    if let Err(e) = result {
        tracing::debug!(code = e.code(), "Command failed: {}", e);
        eprintln!("error: {}", e.user_message());
        std::process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool, log_level: &str) {
    let filter = if verbose { "debug" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
