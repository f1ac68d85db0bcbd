//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a new file and renaming it over the old one are
//! still seen. Events for one save arrive in bursts; they are settled for
//! `debounce`, then the file is loaded once. A config equal to the last one
//! forwarded is not sent again, and an invalid one is logged and dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServiceConfig;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches a config file and forwards each accepted revision.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver accepted configs arrive on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// The returned watcher must be kept alive; dropping it stops reloads.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|name| name.to_os_string());

        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = (event.kind.is_modify() || event.kind.is_create())
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if relevant {
                    let _ = event_tx.send(());
                }
            }
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let current = load_config(&self.path).ok();
        tokio::spawn(forward_reloads(
            self.path.clone(),
            self.debounce,
            current,
            event_rx,
            self.update_tx,
        ));

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

async fn forward_reloads(
    path: PathBuf,
    debounce: Duration,
    mut current: Option<ServiceConfig>,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<ServiceConfig>,
) {
    while events.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while events.try_recv().is_ok() {}

        match load_config(&path) {
            Ok(config) if current.as_ref() == Some(&config) => {
                tracing::debug!(path = ?path, "Config file touched without changes");
            }
            Ok(config) => {
                tracing::info!(path = ?path, clusters = config.clusters.len(), "Config file changed, reloading");
                current = Some(config.clone());
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Rejected config reload, keeping current configuration");
            }
        }
    }
}
