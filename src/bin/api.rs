use stock_query_router::{agent::QueryRouter, api::start_server, config::RouterConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RouterConfig::from_env()?;

    if !config.has_gemini_key() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 Answers will come from the offline mock generator");
    }

    info!("🚀 Stock Query Router - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {}", config.gemini_model);

    let router = Arc::new(QueryRouter::from_config(&config)?);

    info!("✅ Router initialized");
    info!("📡 Starting API server...");

    start_server(router, config.port).await?;

    Ok(())
}
