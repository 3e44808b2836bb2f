//! Payroll Engine HTTP server.
//!
//! Usage: `payroll-engine [CONFIG_PATH]`

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use payroll_engine::api::{create_router, AppState};
use payroll_engine::config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loader = ConfigLoader::resolve(std::env::args_os().nth(1).map(PathBuf::from))?;
    let config = loader.config();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match loader.source() {
        Some(path) => info!(config = %path.display(), "Loaded configuration"),
        None => info!("No configuration file found, using defaults"),
    }

    let state = AppState::from_config(config).await?;
    let app = create_router(state);

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        uploads = %config.uploads.directory.display(),
        database = %config.database.url,
        "Payroll engine listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
