use stock_buy_agent::{
    console::{ConsoleSession, SessionEnd},
    AgentConfig, StockAgent,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AgentConfig::from_env()?;
    info!(?config, "Stock Buy Agent starting");

    let agent = StockAgent::from_config(&config)?;

    let mut session = ConsoleSession::new(
        &agent,
        &config.catalog,
        &config.thread_id,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    match session.run().await {
        Ok(SessionEnd::Finished { .. }) => Ok(()),
        Ok(SessionEnd::InvalidSymbol(_)) | Ok(SessionEnd::InvalidQuantity(_)) => {
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Stock buy session failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
