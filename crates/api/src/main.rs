//! Screening Server - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== NeuroScreen v{} ===", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    run_server(config).await?;

    Ok(())
}
