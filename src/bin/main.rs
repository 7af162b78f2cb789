use stock_query_router::{agent::QueryRouter, config::RouterConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = RouterConfig::from_env()?;
    let router = QueryRouter::from_config(&config)?;

    info!(model = %config.gemini_model, "Query router ready");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Enter your message (type 'exit' to quit):\n")
        .await?;

    loop {
        stdout.write_all(b"\x1b[1m User >>:\x1b[0m ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            stdout.write_all(b"\nChatbot: Session ended.\n").await?;
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.iter().any(|c| query.eq_ignore_ascii_case(c)) {
            stdout.write_all(b"Chatbot: Goodbye!\n").await?;
            break;
        }

        let reply = match router.submit_query(query).await {
            Ok(answer) => format!("\nChatbot: {}\n\n{}\n", answer.response, "=".repeat(80)),
            Err(e) => format!("\nChatbot failed: {}\n\n{}\n", e, "=".repeat(80)),
        };
        stdout.write_all(reply.as_bytes()).await?;
    }

    Ok(())
}
