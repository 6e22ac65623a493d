//! snapshelf-intake - photo intake service
//!
//! Watches a folder for new photos, queues them for the selected catalog
//! item and uploads them on finalize. Serves a JSON API + SSE for the UI.

use anyhow::{Context, Result};
use clap::Parser;
use snapshelf_common::config::{ensure_directory_exists, load_toml_config};
use snapshelf_common::events::EventBus;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use snapshelf_intake::config::{resolve_log_filter, Args, IntakeConfig};
use snapshelf_intake::services::{
    run_intake_loop, CleanupMode, FolderWatcher, HttpCatalogClient, SquareCropNormalizer,
};
use snapshelf_intake::session::WatchedRoot;
use snapshelf_intake::{build_router, AppState, SessionManager};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML first: it can supply the log level
    let toml_config = load_toml_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(resolve_log_filter(
            &args,
            &toml_config,
        )))
        .init();

    info!(
        "Starting SnapShelf intake (snapshelf-intake) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SNAPSHELF_GIT_HASH"),
        env!("SNAPSHELF_BUILD_TIMESTAMP"),
        env!("SNAPSHELF_BUILD_PROFILE")
    );

    let config = match IntakeConfig::resolve(&args, &toml_config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    ensure_directory_exists(&config.watch_folder)?;
    if let Some(archive) = &config.archive_folder {
        ensure_directory_exists(archive)?;
    }

    let root = WatchedRoot::new(&config.watch_folder)
        .with_context(|| format!("Failed to open {}", config.watch_folder.display()))?;
    info!("Watch folder: {}", root.path().display());

    let catalog = Arc::new(
        HttpCatalogClient::new(
            &config.catalog_base_url,
            &config.catalog_access_token,
            config.catalog_timeout,
            config.requests_per_second,
        )
        .context("Failed to build catalog client")?,
    );
    let normalizer = Arc::new(SquareCropNormalizer::new(
        config.normalize.max_edge,
        config.normalize.jpeg_quality,
    ));

    let event_bus = EventBus::new(100);

    let session = Arc::new(
        SessionManager::new(root, catalog.clone(), normalizer, event_bus.clone())
            .with_cleanup_mode(CleanupMode::from_archive_folder(
                config.archive_folder.clone(),
            ))
            .with_upload_timeout(config.upload_timeout)
            .with_normalize_concurrency(config.normalize.concurrency),
    );

    // Watcher → channel → intake loop
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = FolderWatcher::start(session.watched_root().path(), tx)
        .context("Failed to start folder watcher")?;
    let intake = tokio::spawn(run_intake_loop(session.clone(), rx, cancel.clone()));

    let state = AppState::new(session, catalog, event_bus);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("snapshelf-intake listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    drop(watcher);
    if let Err(e) = intake.await {
        error!(error = %e, "Intake loop ended abnormally");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
