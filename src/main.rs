//! `kalshi-odds-proxy` server binary.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kalshi_odds_proxy::server::{self, AppState};
use kalshi_odds_proxy::ProxyConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kalshi_odds_proxy=info,tower_http=info".into()),
        )
        .init();

    let config = ProxyConfig::from_env().context("loading configuration")?;
    let addr = config.socket_addr()?;

    let shutdown = CancellationToken::new();
    let service = config
        .odds_service()
        .context("building upstream client")?
        .with_shutdown(shutdown.clone());
    let state = AppState::new(service, config.credentials.service_key.clone());
    let app = server::app(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        upstream = %config.env.rest_origin,
        timeout_secs = config.upstream_timeout.as_secs(),
        "kalshi odds proxy listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM and cancel in-flight pagination.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received Ctrl+C, shutting down"),
        _ = terminate => warn!("received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
