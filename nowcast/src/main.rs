mod http;
mod server;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use nowcast_core::logging;
use nowcast_core::spotify::SpotifyClient;
use nowcast_core::store::RedisTokenStore;
use nowcast_core::{Config, Engine};

use server::{create_router, shutdown_signal, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_logging(&config.logging)?;
    info!("Nowcast server starting...");

    // The only fatal dependency: without the store there are no tokens
    let store = match RedisTokenStore::connect(&config.redis.url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    let spotify = Arc::new(SpotifyClient::new(config.spotify.clone()));
    let engine = Arc::new(Engine::new(store, spotify.clone()));

    // Eager refresh so the very first poll has a usable token
    engine.refresh_access_token().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(shutdown_rx).await }
    });

    let state = AppState {
        engine: engine.clone(),
        spotify,
        spotify_config: config.spotify.clone(),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    // The engine stops first: that closes every subscriber channel, which
    // ends the WebSocket tasks and lets the server drain its connections
    let graceful = async move {
        shutdown_signal().await;
        info!("Stopping server...");
        let _ = shutdown_tx.send(true);
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await?;

    engine_task.await?;
    info!("Server stopped");
    Ok(())
}
