//! ffai-pipeline - form submission to AI response service
//!
//! Accepts form submissions, defers AI processing behind a signed trigger,
//! and serves the prompt, log and settings APIs plus generated PDFs.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ffai_common::config::{load_toml_config, resolve_config_path, resolve_root_folder, RootLayout};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ffai-pipeline
#[derive(Parser, Debug)]
#[command(name = "ffai-pipeline")]
#[command(about = "Form submission to AI response pipeline")]
#[command(version)]
struct Args {
    /// TOML bootstrap configuration file
    #[arg(short, long, env = "FFAI_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder holding the database and generated PDFs
    #[arg(short, long, env = "FFAI_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "FFAI_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ffai_pipeline={0},ffai_common={0},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ffai-pipeline v{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let layout = RootLayout::new(root_folder);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root.display());

    let cancel = CancellationToken::new();
    let pipeline = ffai_pipeline::startup::start(&config, &layout, cancel.clone())
        .await
        .context("Failed to start pipeline")?;

    let app = ffai_pipeline::build_router(pipeline.state.clone());

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("Server error")?;

    cancel.cancel();
    pipeline.join().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels background work
async fn shutdown_signal(cancel: CancellationToken) {
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
        _ = terminate => info!("Received terminate signal, shutting down"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}
