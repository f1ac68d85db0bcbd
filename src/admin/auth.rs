use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::auth::bearer_matches;
use crate::http::error::ApiError;
use crate::http::server::AppState;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = {
        let config = state.config.load();
        !config.admin.api_key.is_empty()
            && bearer_matches(request.headers(), &config.admin.api_key)
    };

    if authorized {
        return Ok(next.run(request).await);
    }

    Err(ApiError::Unauthorized("admin API key required".into()))
}
