//! Cluster and CRUSH rule endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::cluster::{ClusterEntry, ClusterSummary, CrushSnapshot, Fsid};
use crate::crush::{Rule, RuleSet};
use crate::http::error::{ApiError, ApiResult};
use crate::http::server::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn lookup(state: &AppState, raw_fsid: &str) -> ApiResult<Arc<ClusterEntry>> {
    let fsid: Fsid = raw_fsid.parse()?;
    state
        .registry
        .get(&fsid)
        .ok_or_else(|| ApiError::NotFound(format!("cluster '{}' not found", fsid)))
}

fn snapshot_of(entry: &ClusterEntry) -> ApiResult<Arc<CrushSnapshot>> {
    entry.snapshot().ok_or_else(|| {
        let reason = entry
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "not loaded yet".to_string());
        ApiError::Unavailable(format!(
            "CRUSH map for cluster '{}' unavailable: {}",
            entry.fsid(),
            reason
        ))
    })
}

pub async fn list_clusters(State(state): State<AppState>) -> Json<Vec<ClusterSummary>> {
    Json(state.registry.list().iter().map(|e| e.summary()).collect())
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path(fsid): Path<String>,
) -> ApiResult<Json<ClusterSummary>> {
    Ok(Json(lookup(&state, &fsid)?.summary()))
}

/// `GET /api/v2/cluster/{fsid}/crush_rule_set`
pub async fn list_rule_sets(
    State(state): State<AppState>,
    Path(fsid): Path<String>,
) -> ApiResult<Json<Vec<RuleSet>>> {
    let entry = lookup(&state, &fsid)?;
    let snapshot = snapshot_of(&entry)?;
    Ok(Json(snapshot.rule_sets.clone()))
}

/// `GET /api/v2/cluster/{fsid}/crush_rule`
pub async fn list_rules(
    State(state): State<AppState>,
    Path(fsid): Path<String>,
) -> ApiResult<Json<Vec<Rule>>> {
    let entry = lookup(&state, &fsid)?;
    let snapshot = snapshot_of(&entry)?;
    Ok(Json(snapshot.rules.clone()))
}

/// `GET /api/v2/cluster/{fsid}/crush_rule/{rule_id}`
pub async fn get_rule(
    State(state): State<AppState>,
    Path((fsid, rule_id)): Path<(String, String)>,
) -> ApiResult<Json<Rule>> {
    let entry = lookup(&state, &fsid)?;
    let rule_id: i64 = rule_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid rule id '{}'", rule_id)))?;
    let snapshot = snapshot_of(&entry)?;
    snapshot
        .rule(rule_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("rule {} not found in cluster '{}'", rule_id, entry.fsid())))
}
