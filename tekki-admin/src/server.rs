//! HTTP server wiring.
//!
//! Builds the identity client and admin directory from configuration and
//! serves the admin router until Ctrl-C.

use anyhow::{Context, Result};
use reqwest::Client;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::admin::{AdminState, admin_router};
use crate::config::{Config, DirectoryBackend};
use crate::db::Database;
use crate::directory::{AdminDirectory, RestAdminDirectory, SqlAdminDirectory};
use crate::identity::{IdentityProvider, SupabaseAuth};

/// Construct the shared admin state.
///
/// The identity client and the REST directory share one HTTP connection pool.
pub async fn build_state(config: &Config, data_dir: &Path) -> Result<Arc<AdminState>> {
    config
        .paths
        .validate()
        .context("Invalid [paths] configuration")?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.identity.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(SupabaseAuth::with_client(client.clone(), &config.identity));

    let directory: Arc<dyn AdminDirectory> = match config.directory.backend {
        DirectoryBackend::Rest => Arc::new(RestAdminDirectory::new(
            client,
            &config.identity,
            &config.directory,
        )),
        DirectoryBackend::Database => {
            let db = Database::new(&config.database, data_dir).await?;
            Arc::new(SqlAdminDirectory::new(db.pool()))
        }
    };

    info!(
        identity = %config.identity.url,
        directory = ?config.directory.backend,
        login = %config.paths.login,
        dashboard = %config.paths.dashboard,
        "Admin gate configured"
    );

    Ok(Arc::new(AdminState::new(identity, directory, &config.paths)))
}

/// Serve the admin router on `listen_addr` until shutdown.
pub async fn run_server(listen_addr: SocketAddr, state: Arc<AdminState>) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;

    info!("Listening on: {}", listener.local_addr()?);

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
