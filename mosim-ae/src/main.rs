//! mosim-ae - Motion-similarity Analysis Engine service
//!
//! Receives completed movement-test recordings, scores them against the
//! reference performance of the exercise and serves the stored results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mosim_ae::analysis::AnalysisEngine;
use mosim_ae::templates::ReferenceLibrary;
use mosim_ae::{config, AppState};
use mosim_common::config::{RootFolderInitializer, RootFolderResolver};

/// Command-line arguments for mosim-ae
#[derive(Parser, Debug)]
#[command(name = "mosim-ae")]
#[command(about = "Motion-similarity analysis engine")]
#[command(version)]
struct Args {
    /// Root folder holding mosim.db and templates/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: $MOSIM_CONFIG, then ~/.config/mosim/mosim-ae.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MOSIM_AE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting mosim-ae v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let root_folder = RootFolderResolver::new("mosim-ae")
        .with_cli_arg(args.root_folder)
        .with_toml_value(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = mosim_ae::db::init_database_pool(&db_path)
        .await
        .context("Failed to open session store")?;

    let references = ReferenceLibrary::load_dir(&initializer.templates_path())
        .context("Failed to load reference templates")?;
    if references.is_empty() {
        warn!(
            "No reference templates in {}; every analysis will fail until one is added",
            initializer.templates_path().display()
        );
    } else {
        info!("Reference templates: {}", references.len());
    }

    let engine_settings = &config.engine;
    let engine = AnalysisEngine::new(
        references,
        engine_settings.dtw(),
        engine_settings.scorer()?,
        engine_settings.normalization,
    );
    info!(
        band = ?engine_settings.dtw().constraint(),
        normalization = ?engine_settings.normalization,
        "Analysis engine ready"
    );

    let state = AppState::new(db_pool, engine)
        .with_analysis_timeout(engine_settings.analysis_timeout())
        .with_max_body_bytes(engine_settings.max_body_bytes);
    let app = mosim_ae::build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
