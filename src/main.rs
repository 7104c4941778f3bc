//! Peekachoo admin panel server.
//!
//! Serves the dashboard-facing REST API and forwards to the game backend's
//! admin API with the service key.
//!
//! Usage:
//!   ADMIN_API_KEY=... cargo run --bin peekachoo-admin
//!   # then log in with peekachoo-admin-cli (see `--help`)

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

use peekachoo_admin::auth::{signing_key, SessionGuard};
use peekachoo_admin::backend::HttpBackend;
use peekachoo_admin::config::AdminConfig;
use peekachoo_admin::logging;
use peekachoo_admin::rest::{apply_http_layers, create_router, AppState};

const SERVICE_NAME: &str = "peekachoo-admin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AdminConfig::from_env()?;
    let _log_guards = logging::init(SERVICE_NAME);

    let backend = HttpBackend::new(
        &config.backend_url,
        config.admin_api_key.clone(),
        config.backend_timeout,
    )
    .context("failed to build backend client")?;
    let key = signing_key(config.session_secret.as_deref())?;
    let guard = SessionGuard::new(config.admin_password.clone(), config.secure_cookies);

    let state = AppState::new(Arc::new(backend), guard, key);
    let app = apply_http_layers(create_router(state));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.backend_url,
        secure_cookies = config.secure_cookies,
        "admin panel listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("admin panel stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
