// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Anarchy Auth Node
//!
//! Entry point for the `anarchy-auth-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the extractor and session store
//! into a key custody service, and serves the HTTP API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the HTTP service
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use anarchy_auth::biometric::{CommandExtractor, Extractor, FeatureExtractor};
use anarchy_auth::session::SessionStore;
use anarchy_auth::KeyCustodyService;

use cli::{AnarchyNodeCli, Commands};
use logging::LogFormat;
use metrics::AuthMetrics;

/// How often the `active_sessions` gauge is refreshed between requests.
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AnarchyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds the configured extractor. No command means hash-fallback only.
fn build_extractor(command: Option<&str>) -> Extractor {
    match command.and_then(CommandExtractor::from_command_line) {
        Some(extractor) => {
            tracing::info!(extractor = %extractor.name(), "iris extractor configured");
            Extractor::new(extractor)
        }
        None => {
            tracing::warn!(
                "no iris extractor configured; every key will be derived from a hash of the raw image"
            );
            Extractor::Unavailable
        }
    }
}

/// Starts the key service: API server, metrics endpoint, session sweeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = args.service_config();
    config.validate().context("invalid service configuration")?;

    tracing::info!(
        bind = %args.bind,
        metrics_port = args.metrics_port,
        session_ttl_secs = args.session_ttl_secs,
        extraction_timeout_secs = args.extraction_timeout_secs,
        max_upload_bytes = args.max_upload_bytes,
        "starting anarchy-auth-node"
    );

    // --- Extractor ---
    let extractor = build_extractor(args.extractor_cmd.as_deref());

    // --- Sessions ---
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let sweeper = sessions.spawn_sweeper(config.sweep_interval);

    // --- Service ---
    let service = Arc::new(
        KeyCustodyService::new(extractor, Arc::clone(&sessions), config)
            .context("failed to build key custody service")?,
    );

    // --- Metrics ---
    let auth_metrics =
        Arc::new(AuthMetrics::new().context("failed to register prometheus metrics")?);

    let gauge_sessions = Arc::clone(&sessions);
    let gauge_metrics = Arc::clone(&auth_metrics);
    let gauge_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(GAUGE_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            gauge_metrics.set_active_sessions(gauge_sessions.active_count());
        }
    });

    // --- Application state ---
    let app_state = api::AppState {
        service,
        metrics: Arc::clone(&auth_metrics),
        max_upload_bytes: args.max_upload_bytes,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind API listener on {}", args.bind))?;
    tracing::info!("API server listening on {}", args.bind);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&auth_metrics));
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], args.metrics_port));
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, dropping all sessions");
        }
    }

    gauge_loop.abort();
    sweeper.abort();
    tracing::info!(
        sessions_dropped = sessions.len(),
        "anarchy-auth-node stopped"
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("anarchy-auth-node {}", env!("CARGO_PKG_VERSION"));
    println!(
        "derivation        v{} ({} seed, {} keys)",
        anarchy_auth::config::DERIVATION_VERSION,
        anarchy_auth::config::ENTROPY_DIGEST,
        anarchy_auth::config::SIGNING_ALGORITHM
    );
    println!("rustc             {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that fails to
/// install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
