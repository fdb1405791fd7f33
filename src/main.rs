/// flowdeck: workflow graph editor core
///
/// Main entry point for the flowdeck server. Initializes configuration and starts
/// the HTTP server with document editing and simulation endpoints.

use flowdeck::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Document editing with undo/redo at /api/document/*
/// - Node schema registry at /api/registry
/// - Execution simulator at /api/simulation/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (FLOWDECK_* environment variables over defaults)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
