//! Server lifecycle management

use std::sync::Arc;

use axum::{routing::get, Router};
use nowcast_core::config::SpotifyConfig;
use nowcast_core::spotify::SpotifyClient;
use nowcast_core::Engine;
use tracing::info;

use crate::http;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub spotify: Arc<SpotifyClient>,
    pub spotify_config: SpotifyConfig,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(http::auth::authorize))
        .route("/auth/callback", get(http::auth::callback))
        .route("/ws", get(http::websocket::websocket_handler))
        .with_state(state)
}

/// Resolves when SIGINT or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received");
}
