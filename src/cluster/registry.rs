//! Per-cluster CRUSH snapshots.
//!
//! # Responsibilities
//! - Hold one entry per configured fsid
//! - Reload each cluster's CRUSH dump on demand
//! - Keep serving the last good snapshot when a reload fails
//!
//! # Design Decisions
//! - Snapshots are immutable and swapped atomically (ArcSwap)
//! - Rule sets are derived once per load, not per request
//! - The map is concurrent (DashMap); no lock is held across an await

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::cluster::fsid::Fsid;
use crate::config::ClusterConfig;
use crate::crush::{CrushError, CrushMap, Rule, RuleSet};
use crate::observability::metrics;

/// Errors raised while refreshing a cluster snapshot.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Crush(#[from] CrushError),
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Derived view of one CRUSH map load.
#[derive(Debug, Clone)]
pub struct CrushSnapshot {
    pub rule_sets: Vec<RuleSet>,
    pub rules: Vec<Rule>,
    pub device_count: usize,
    /// Unix seconds.
    pub loaded_at: u64,
}

impl CrushSnapshot {
    pub fn from_map(map: &CrushMap) -> Self {
        let rules = map.rules();
        Self {
            rule_sets: crate::crush::map::group_rule_sets(rules.clone()),
            rules,
            device_count: map.devices().len(),
            loaded_at: now_secs(),
        }
    }

    pub fn rule(&self, id: i64) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// Freshness of a cluster's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    /// Last refresh succeeded.
    Ok,
    /// Last refresh failed; an older snapshot is served.
    Stale,
    /// No snapshot has ever loaded.
    Unavailable,
}

/// Cluster summary as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: Fsid,
    pub name: String,
    pub update_time: Option<u64>,
    pub status: ClusterStatus,
}

/// One configured cluster.
#[derive(Debug)]
pub struct ClusterEntry {
    fsid: Fsid,
    name: String,
    source: PathBuf,
    snapshot: ArcSwapOption<CrushSnapshot>,
    last_error: ArcSwapOption<String>,
    last_attempt: AtomicU64,
}

impl ClusterEntry {
    pub fn new(fsid: Fsid, name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            fsid,
            name: name.into(),
            source: source.into(),
            snapshot: ArcSwapOption::empty(),
            last_error: ArcSwapOption::empty(),
            last_attempt: AtomicU64::new(0),
        }
    }

    /// A copy under a new name that keeps the loaded snapshot and refresh state.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            fsid: self.fsid,
            name: name.into(),
            source: self.source.clone(),
            snapshot: ArcSwapOption::new(self.snapshot.load_full()),
            last_error: ArcSwapOption::new(self.last_error.load_full()),
            last_attempt: AtomicU64::new(self.last_attempt()),
        }
    }

    pub fn fsid(&self) -> Fsid {
        self.fsid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn snapshot(&self) -> Option<Arc<CrushSnapshot>> {
        self.snapshot.load_full()
    }

    pub fn last_error(&self) -> Option<Arc<String>> {
        self.last_error.load_full()
    }

    /// Unix seconds of the last refresh attempt, 0 if never attempted.
    pub fn last_attempt(&self) -> u64 {
        self.last_attempt.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> ClusterStatus {
        match (self.snapshot.load().is_some(), self.last_error.load().is_some()) {
            (false, _) => ClusterStatus::Unavailable,
            (true, true) => ClusterStatus::Stale,
            (true, false) => ClusterStatus::Ok,
        }
    }

    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            id: self.fsid,
            name: self.name.clone(),
            update_time: self.snapshot().map(|s| s.loaded_at),
            status: self.status(),
        }
    }

    /// Re-read the CRUSH dump. The previous snapshot survives a failure.
    pub async fn refresh(&self) -> Result<(), RegistryError> {
        self.last_attempt.store(now_secs(), Ordering::Relaxed);
        match self.load().await {
            Ok(snapshot) => {
                tracing::debug!(
                    fsid = %self.fsid,
                    rules = snapshot.rules.len(),
                    devices = snapshot.device_count,
                    "CRUSH map loaded"
                );
                self.snapshot.store(Some(Arc::new(snapshot)));
                self.last_error.store(None);
                metrics::record_refresh("ok");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    fsid = %self.fsid,
                    path = ?self.source,
                    error = %e,
                    "CRUSH map refresh failed"
                );
                self.last_error.store(Some(Arc::new(e.to_string())));
                metrics::record_refresh("error");
                Err(e)
            }
        }
    }

    async fn load(&self) -> Result<CrushSnapshot, RegistryError> {
        let text = tokio::fs::read_to_string(&self.source)
            .await
            .map_err(|source| RegistryError::Io {
                path: self.source.clone(),
                source,
            })?;
        let map = CrushMap::from_json(&text)?;
        Ok(CrushSnapshot::from_map(&map))
    }
}

/// All clusters served by this instance.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: DashMap<Fsid, Arc<ClusterEntry>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry directly, replacing any entry with the same fsid.
    pub fn insert(&self, entry: ClusterEntry) -> Arc<ClusterEntry> {
        let entry = Arc::new(entry);
        self.clusters.insert(entry.fsid(), entry.clone());
        metrics::record_cluster_count(self.clusters.len());
        entry
    }

    /// Reconcile with a configured cluster list and load new entries.
    ///
    /// Clusters with the same source keep their snapshot, even when renamed.
    /// A changed source starts fresh.
    pub async fn apply(&self, clusters: &[ClusterConfig]) {
        let mut wanted = Vec::with_capacity(clusters.len());
        let mut fresh = Vec::new();

        for cluster in clusters {
            let fsid: Fsid = match cluster.fsid.parse() {
                Ok(fsid) => fsid,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping cluster with invalid fsid");
                    continue;
                }
            };
            wanted.push(fsid);

            let previous = self.get(&fsid);
            match previous {
                Some(entry) if entry.source == Path::new(&cluster.crush_map) => {
                    if entry.name != cluster.name {
                        tracing::info!(fsid = %fsid, from = %entry.name, to = %cluster.name, "Cluster renamed");
                        self.insert(entry.renamed(&cluster.name));
                    }
                }
                _ => {
                    tracing::info!(fsid = %fsid, name = %cluster.name, "Cluster registered");
                    fresh.push(self.insert(ClusterEntry::new(fsid, &cluster.name, &cluster.crush_map)));
                }
            }
        }

        self.clusters.retain(|fsid, entry| {
            let keep = wanted.contains(fsid);
            if !keep {
                tracing::info!(fsid = %fsid, name = %entry.name, "Cluster removed");
            }
            keep
        });
        metrics::record_cluster_count(self.clusters.len());

        for entry in fresh {
            let _ = entry.refresh().await;
        }
    }

    pub fn get(&self, fsid: &Fsid) -> Option<Arc<ClusterEntry>> {
        self.clusters.get(fsid).map(|e| e.value().clone())
    }

    /// Entries ordered by name, then fsid.
    pub fn list(&self) -> Vec<Arc<ClusterEntry>> {
        let mut entries: Vec<_> = self.clusters.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.fsid.cmp(&b.fsid)));
        entries
    }

    /// Refresh every cluster. Returns how many refreshes failed.
    pub async fn refresh_all(&self) -> usize {
        let mut failed = 0;
        for entry in self.list() {
            if entry.refresh().await.is_err() {
                failed += 1;
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
