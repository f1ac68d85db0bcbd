use axum::{extract::State, Json};
use serde::Serialize;

use crate::cluster::{ClusterStatus, ClusterSummary};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub clusters: usize,
    pub stale_clusters: usize,
    pub unavailable_clusters: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let entries = state.registry.list();
    let stale = entries
        .iter()
        .filter(|e| e.status() == ClusterStatus::Stale)
        .count();
    let unavailable = entries
        .iter()
        .filter(|e| e.status() == ClusterStatus::Unavailable)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if stale + unavailable == 0 { "operational" } else { "degraded" },
        clusters: entries.len(),
        stale_clusters: stale,
        unavailable_clusters: unavailable,
    })
}

/// Reload every cluster's CRUSH map now.
pub async fn post_refresh(State(state): State<AppState>) -> Json<Vec<ClusterSummary>> {
    let failed = state.registry.refresh_all().await;
    tracing::info!(failed, "Manual refresh completed");
    Json(state.registry.list().iter().map(|e| e.summary()).collect())
}
