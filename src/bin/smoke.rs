use stock_buy_agent::{
    llm::{ChatModel, GeminiClient},
    AgentConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PROMPT: &str = "Sing a ballad of LangChain.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let config = AgentConfig::from_env()?;
    let client = GeminiClient::new(config.api_key.clone(), config.smoke_model.clone())?
        .with_base_url(config.base_url.clone())
        .with_temperature(config.temperature)
        .with_system_prompt(None);

    info!(model = client.model(), "Sending smoke prompt");

    let reply = client.generate_text(&prompt).await?;
    println!("{}", reply);

    Ok(())
}
