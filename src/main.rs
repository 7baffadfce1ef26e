//! Arena Game Server - Authoritative multiplayer game server
//!
//! Entry point for the headless server: it runs the deterministic simulation
//! session and broadcasts snapshots. Transport endpoints attach to the
//! session through its handle.

use arena_game_server::config::Config;
use arena_game_server::physics::Heightfield;
use arena_game_server::server::ServerSession;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Arena Game Server");
    info!(seed = config.world_seed, "world seed");

    let terrain = Heightfield::flat(
        0.0,
        config.terrain_size,
        config.terrain_size,
        config.terrain_cell_size,
    );
    let (session, handle) = ServerSession::new(config.world_seed, terrain);

    let session_task = tokio::spawn(session.run());

    shutdown_signal().await;

    // Dropping the handle closes the command channel; the session loop exits
    // on its next tick.
    drop(handle);
    session_task.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
