//! Bearer token checks.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// True when `Authorization: Bearer <key>` is present and matches.
pub fn bearer_matches(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim() == key)
        .unwrap_or(false)
}

/// Guards `/api/*` when `security.api_key` is set. Reads the live config.
pub async fn api_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = match state.config.load().security.api_key.as_deref() {
        Some(key) => bearer_matches(request.headers(), key),
        None => true,
    };
    if !authorized {
        return Err(ApiError::Unauthorized("missing or invalid bearer token".into()));
    }
    Ok(next.run(request).await)
}
