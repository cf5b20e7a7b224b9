use anyhow::Context as _;
use story_relay::config::{self, RelayConfig};
use story_relay::observability::init_observability;
use story_relay::routes::{AppState, router};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    init_observability();

    let config = RelayConfig::from_env();
    let harness = config
        .build_harness()
        .context("failed to build upstream providers")?;
    let bind_addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(
        addr = %bind_addr,
        assistant_configured = config.assistant_id.is_some(),
        image_dir = ?config.image_dir,
        "story relay listening"
    );

    axum::serve(listener, router(AppState::new(harness, config)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")?;
    info!("story relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
