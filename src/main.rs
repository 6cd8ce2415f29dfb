use anyhow::Context;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};
use transit_eta::{api, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::from_env()?;
    tracing::info!("estimator config: {:?}", cfg.estimator);

    let state = api::AppState::demo(cfg.estimator);
    tracing::info!(
        "loaded demo network; stops={} routes={} buses={}",
        state.catalog.stops().len(),
        state.catalog.routes().len(),
        state.fleet.read().len()
    );

    let app = api::router(state);

    tracing::info!("listening on {}", cfg.addr);
    let listener = tokio::net::TcpListener::bind(cfg.addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
