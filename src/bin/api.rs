use stock_buy_agent::{api::start_server, catalog::PriceCatalog, AgentConfig, StockAgent};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AgentConfig::from_env()?;
    if !config.has_api_key() {
        warn!("GEMINI_API_KEY not set in .env");
    }

    info!("Stock Buy Agent - API Server");
    info!("Port: {}", config.port);

    let agent = Arc::new(StockAgent::from_config(&config)?);
    let catalog: Arc<dyn PriceCatalog> = Arc::new(config.catalog.clone());

    info!("Agent initialized, starting API server...");

    start_server(agent, catalog, config.port).await?;

    Ok(())
}
