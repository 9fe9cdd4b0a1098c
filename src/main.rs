use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use frontdesk_connect::{api, store, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frontdesk_connect=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("frontdesk-connect v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    let store = store::connect(&config)
        .await
        .context("Failed to initialize page store")?;
    store.migrate().await.context("Page store migration failed")?;
    info!("Page store ready ✓");

    let state = AppState::from_config(config.clone(), store).context("Invalid configuration")?;

    match &state.facebook {
        Some(_) => info!("Facebook OAuth enabled (callback: {})", config.callback_url()),
        None => warn!("FB_APP_ID / FB_APP_SECRET not set, Facebook connect disabled"),
    }
    if state.forwarder.is_none() {
        warn!("N8N_WEBHOOK_URL not set, lead webhooks will be rejected");
    }
    if !state.crypto.encrypts_tokens() {
        warn!("TOKEN_ENCRYPTION_KEY not set, page tokens are stored in plaintext");
    }
    if state.web_calls.is_some() {
        info!("Retell voice demo proxy enabled");
    }

    let state: SharedState = Arc::new(state);
    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
