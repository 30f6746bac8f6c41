//! primegauge server binary.
//!
//! Loads `$PRIMEGAUGE_CONFIG` (default `primegauge.yaml`), mounts the example
//! resources and serves until Ctrl-C / SIGTERM.

use tracing_subscriber::{fmt, EnvFilter};

use primegauge_core::error::{PrimeGaugeError, Result};
use primegauge_server::{app_state::AppState, config, router};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.client_code().as_str(), "primegauge-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.listen_addr()?;

    let state = AppState::new(cfg)?;
    let publisher = state
        .publisher()
        .map(|p| p.spawn(state.subscribe_shutdown()));
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "primegauge-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PrimeGaugeError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|e| PrimeGaugeError::Internal(format!("server failed: {e}")))?;

    if let Some(handle) = publisher {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "publisher task ended abnormally");
        }
    }
    tracing::info!("primegauge-server stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
    state.shutdown();
}
