//! MkulimaMkononi Gateway - Main entry point.

use anyhow::Result;
use mkulima_common::config::Config;
use mkulima_common::logging::init_logging;
use mkulima_gateway::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("MkulimaMkononi Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Start the HTTP server
    start_server(&config).await
}
