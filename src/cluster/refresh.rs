//! Periodic snapshot refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::cluster::registry::ClusterRegistry;
use crate::config::InventoryConfig;

/// Background task that reloads every cluster's CRUSH map on an interval.
pub struct RefreshMonitor {
    registry: Arc<ClusterRegistry>,
    config: InventoryConfig,
}

impl RefreshMonitor {
    pub fn new(registry: Arc<ClusterRegistry>, config: InventoryConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.refresh_enabled {
            tracing::info!("Periodic CRUSH map refresh disabled");
            return;
        }

        tracing::info!(
            interval = self.config.refresh_interval_secs,
            "Refresh monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.refresh_interval_secs));
        // The first tick fires immediately; clusters were loaded at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let failed = self.registry.refresh_all().await;
                    if failed > 0 {
                        tracing::warn!(failed, total = self.registry.len(), "Some clusters failed to refresh");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Refresh monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::registry::{ClusterEntry, ClusterStatus};
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_monitor_refreshes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");

        let registry = Arc::new(ClusterRegistry::new());
        let entry = registry.insert(ClusterEntry::new(
            "12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11".parse().unwrap(),
            "ceph",
            &path,
        ));
        assert_eq!(entry.status(), ClusterStatus::Unavailable);

        // The dump appears after startup; the monitor picks it up.
        std::fs::write(
            &path,
            r#"{"rules": [{"rule_id": 0, "rule_name": "data", "ruleset": 0, "type": 1, "min_size": 1, "max_size": 10}]}"#,
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let monitor = RefreshMonitor::new(
            registry.clone(),
            InventoryConfig {
                refresh_enabled: true,
                refresh_interval_secs: 1,
            },
        );
        let handle = tokio::spawn(monitor.run(shutdown.subscribe()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(entry.status(), ClusterStatus::Ok);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
