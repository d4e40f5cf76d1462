//! HTTP front end

mod handlers;

use anyhow::{anyhow, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::app::ChatService;

pub type AppState = Arc<ChatService>;

/// Build the router with all API routes, plus the frontend when
/// `static_dir` exists
pub fn build_router(service: AppState, static_dir: &Path) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat-list", get(handlers::chat_list))
        .route("/api/chat", post(handlers::chat))
        .route("/api/new-chat", post(handlers::new_chat))
        .route("/api/chat-history", get(handlers::chat_history))
        .route("/api/clear-memory", post(handlers::clear_memory))
        .route("/api/test-code", post(handlers::test_code))
        .route("/api/delete-chat", post(handlers::delete_chat))
        .with_state(service);

    if static_dir.exists() {
        let index = static_dir.join("index.html");
        let static_service = ServeDir::new(static_dir).not_found_service(ServeFile::new(index));
        app = app.fallback_service(static_service);
    } else {
        warn!(
            "Static directory {} not found, serving the API only",
            static_dir.display()
        );
    }

    app.layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn serve(service: AppState, bind_addr: &str, static_dir: &Path) -> Result<()> {
    let app = build_router(service, static_dir);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", bind_addr, e))?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to create SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }
}
