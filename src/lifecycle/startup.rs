//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from the loaded config
//! - Install signal handling and the config watcher
//! - Bind the listener and hand over to the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::ServiceConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::{logging, metrics};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the service until a stop signal arrives.
///
/// With `config_path` set, edits to that file are hot-reloaded.
pub async fn run(config: ServiceConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        clusters = config.clusters.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "crushd starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());

    // The watcher must outlive the server; dropping it stops notifications.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
