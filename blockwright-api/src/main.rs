use anyhow::{Context, Result};
use blockwright_api::{app_with_config, ApiConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blockwright=info,blockwright_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;
    blockwright::init();

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(
        "blockwright API listening on http://{} (max upload {} bytes)",
        config.addr, config.max_upload
    );

    axum::serve(listener, app_with_config(&config)).await?;
    Ok(())
}
