use anyhow::Context;
use tracing_subscriber::EnvFilter;

use buildmanager_api::config::{self, AppConfig};
use buildmanager_api::routes;
use buildmanager_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, S3_BUCKET_NAME, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("buildmanager_api=info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config: AppConfig = config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting BuildManager API in {:?} mode", config.environment);
    if buildmanager_api::is_production!() && !config.security.cookie_secure {
        tracing::warn!("Session cookies are not marked Secure in production");
    }

    let bind_addr = config.bind_address();
    let state = AppState::from_config(config)
        .await
        .context("initializing backends")?;
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("BuildManager API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
