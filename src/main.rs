use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcp_field_advisor::{Config, DebounceStore, FieldAdvisor, InMemoryDebounceStore};

/// How often expired debounce windows are dropped.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_field_advisor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting MCP field advisor");

    let config = Config::load_default()?;
    let store = Arc::new(InMemoryDebounceStore::new());

    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.sweep_expired(OffsetDateTime::now_utc());
            if removed > 0 {
                tracing::debug!("Dropped {} expired debounce windows", removed);
            }
        }
    });

    let advisor = FieldAdvisor::new(config, store)?;
    let server = advisor.serve(rmcp::transport::stdio()).await?;
    server.waiting().await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
