use anyhow::Context;
use coinrush_server::{Config, ServerState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Server Version: {}", coinrush_server::VERSION);

    let config = Config::from_env();
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!("Listening on port {}", config.port);

    coinrush_server::serve(listener, ServerState::new(config.sim)).await;
    Ok(())
}
