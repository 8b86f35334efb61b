use anyhow::Context;
use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booth_floorplan::{config::Config, controllers, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booth floor plan service ({})", config.app.environment);

    let host = config.app.host.clone();
    let port = config.app.port;
    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize application state")?;

    let app = Router::new()
        .route("/", get(|| async { "Booth Floor Plan API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{host}:{port}").parse().context("Invalid HOST/PORT")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind listener")?;
    axum::serve(listener, app.into_make_service()).await.context("Server error")?;
    Ok(())
}
