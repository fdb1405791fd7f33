/// Server setup and initialization
///
/// Wires together storage, the editor session and the HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_document_routes, create_simulation_routes, AppState},
    config::Config,
    history::EditorSession,
    workflow::storage::{DocumentSink, SqliteDocumentStore},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Opens the SQLite document store and seeds the editor session from it.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Initializing document storage: {}", config.storage.database_path);
    let store = SqliteDocumentStore::open(&config.storage.database_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open document database: {}", e))?;

    create_app_with_sink(config, Arc::new(store)).await
}

/// Create the application over an arbitrary document sink
pub async fn create_app_with_sink(config: Config, sink: Arc<dyn DocumentSink>) -> Result<Router> {
    tracing::info!("📋 Initializing editor session (key: {})", config.storage.storage_key);
    let mut session = EditorSession::new(sink, config.storage.storage_key.clone(), &config.history);

    tracing::info!("📥 Loading document from storage");
    session
        .initialize_from_storage(config.storage.sample.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load document from storage: {}", e))?;

    tracing::info!("🏗️ Creating application state");
    let state = AppState::new(session, config);

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_document_routes())
        .merge(create_simulation_routes())
        .with_state(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting flowdeck server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
