//! Session Gateway Binary
//!
//! Entry point for the session upload gateway service.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_gateway::{
    api::{build_router, AppState},
    config::Config,
};

/// Environment variable naming an optional TOML config file
const CONFIG_PATH_ENV: &str = "SESSION_GATEWAY_CONFIG";

/// Log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting Session Gateway...");

    // Load configuration
    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let config = Arc::new(Config::load(config_path.as_deref())?);

    let state = AppState::new(config.clone());

    tracing::info!(
        sessions_dir = %config.storage.sessions_dir.display(),
        api_key_enforced = state.api_keys.is_enforced(),
        max_upload_bytes = config.limits.max_upload_bytes,
        missing_session = ?config.sessions.missing_session,
        "Configuration loaded"
    );
    if !state.api_keys.is_enforced() {
        tracing::warn!("API_KEY not set; uploads are accepted without a key");
    }

    match state.store.sweep_staging().await {
        Ok(0) => {}
        Ok(n) => tracing::info!(removed = n, "Removed interrupted uploads from staging"),
        Err(e) => tracing::warn!(error = %e, "Could not sweep staging directory"),
    }

    // Build HTTP router
    let router = build_router(state);

    // Start HTTP server
    let bind_addr = config.server.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    // Run the HTTP server with graceful shutdown on SIGTERM/SIGINT
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining in-flight requests...");
    })
    .await?;

    tracing::info!("Session Gateway shutdown complete");
    Ok(())
}

/// Initialize tracing; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_parses() {
        let filter = tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        assert!(filter.to_string().contains("tower_http=debug"));
    }
}
