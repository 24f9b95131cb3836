//! Clinic Ops event store API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clinicops_api::error::AppError;
use clinicops_api::state::AppState;
use clinicops_event_store::{EventStoreConfig, TracingPublisher, build_event_store};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Clinic Ops event store API server");

    // Read configuration from environment.
    let config = EventStoreConfig::from_env()?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;

    // Build the event store and create its schema before taking traffic.
    let mut event_store = build_event_store(&config)?;
    event_store.add_publisher(Arc::new(TracingPublisher));
    event_store.initialize().await?;
    let event_store = Arc::new(event_store);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = clinicops_api::app(AppState::new(Arc::clone(&event_store)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    event_store.close().await?;
    tracing::info!("Event store closed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
