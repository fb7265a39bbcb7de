// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

use warden_server::{
    api::router,
    auth::AuthError,
    bootstrap,
    config::{AppConfig, ConfigError},
    logging::init_logging,
    rbac::RbacError,
    session_sweeper::SessionSweeper,
    state::AppState,
    storage::{open_database, StoreError, TtlStore},
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("auth setup error: {0}")]
    Auth(#[from] AuthError),

    #[error("seeding error: {0}")]
    Seed(#[from] RbacError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_logging(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!(?config, "Starting warden server");

    let db = open_database(&config.database_path())?;
    let state = AppState::from_config(&config, db.clone())?;
    let (app, registry) = router(state.clone());

    bootstrap::seed(&config, &state, &registry)?;

    let shutdown = CancellationToken::new();
    let sweeper = SessionSweeper::new(TtlStore::new(db), config.session_sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        tracing::warn!(error = %e, "Session sweeper task ended abnormally");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
