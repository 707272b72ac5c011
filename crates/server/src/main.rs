//! Showroom admin server entry point.

use std::net::SocketAddr;

use showroom_api::{AppState, app};
use showroom_common::Config;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showroom=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting showroom admin server...");

    // Load configuration
    let config = Config::load()?;
    let storage = &config.storage;

    tokio::fs::create_dir_all(storage.document_root.join(&storage.collection_images_dir)).await?;
    tokio::fs::create_dir_all(storage.gallery_path()).await?;

    info!(
        root = %storage.document_root.display(),
        collections = %storage.collections_path().display(),
        gallery = %storage.gallery_path().display(),
        legacy_paths = config.server.legacy_paths,
        "Serving document root"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config);
    match state.manifest().recompute().await {
        Ok(counts) => info!(male = counts.male, female = counts.female, "Gallery scanned"),
        Err(e) => tracing::warn!(error = %e, "Could not scan gallery"),
    }

    let app = app(state).layer(TraceLayer::new_for_http());

    // Start server with graceful shutdown
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
