//! Parley server binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Install tracing with the resolved log filter
//! 3. Pick the connected account from the environment
//! 4. Serve HTTP and WebSocket sessions until Ctrl-C

mod cli;

use std::sync::Arc;

use clap::Parser;

use parley_api::{start_server, AppState, LiveSessionFactory, SessionFactory};
use parley_core::config::ParleyConfig;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is loaded before tracing so its log level can apply; load
    // warnings are replayed once the subscriber exists.
    let config_file = args.resolve_config_path();
    let loaded = ParleyConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ParleyConfig::default(),
    };

    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Using default configuration"
        ),
    }

    config.server.port = args.resolve_port(config.server.port);

    let sessions = Arc::new(LiveSessionFactory::new(config.clone()));
    match sessions.connected_service() {
        Some(kind) => tracing::info!(service = %kind, "Account connected"),
        None => tracing::warn!(
            "No account token found in {} or {}; sessions will be refused",
            config.google.access_token_env,
            config.microsoft.access_token_env
        ),
    }

    let state = AppState::new(config.clone(), sessions);
    if let Err(e) = start_server(&config, state).await {
        tracing::error!(error = %e, "Server stopped");
        return Err(e.into());
    }

    tracing::info!("Parley stopped");
    Ok(())
}
