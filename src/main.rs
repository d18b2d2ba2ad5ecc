use std::sync::Arc;

use anyhow::Context;
use assistant_relay::config::RelayConfig;
use assistant_relay::server::build_router;
use assistant_relay::util::{init_tracing, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;

    if config.assistant_id.is_none() {
        tracing::warn!("ASSISTANT_ID is not set; /api/chat will answer 500 until it is configured");
    }
    if !config.has_api_key() {
        tracing::warn!("OPENAI_API_KEY is not set; upstream calls will be rejected");
    }
    match config.max_poll_attempts {
        Some(max) => tracing::info!(
            "Run polling every {:?}, giving up after {} checks",
            config.poll_interval,
            max
        ),
        None => tracing::info!(
            "Run polling every {:?} with no attempt limit",
            config.poll_interval
        ),
    }

    let addr = config.bind_addr.clone();
    let app = build_router(Arc::new(AppState::new(config)));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Assistant relay listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}
