//! In-flight request limit.
//!
//! A request waits for a semaphore permit before it reaches a handler and
//! holds it until the response is produced. When `max_connections`
//! requests are in flight, further requests queue (backpressure).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Semaphore;

use crate::http::error::ApiError;

pub async fn concurrency_limit_middleware(
    State(limit): State<Arc<Semaphore>>,
    request: Request,
    next: Next,
) -> Response {
    let _permit = match limit.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return ApiError::Unavailable("server is shutting down".into()).into_response();
        }
    };
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_requests_wait_for_a_permit() {
        let limit = Arc::new(Semaphore::new(1));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                limit.clone(),
                concurrency_limit_middleware,
            ));

        let held = limit.clone().acquire_owned().await.unwrap();
        let pending = tokio::spawn(
            app.clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(held);
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_closed_limit_rejects() {
        let limit = Arc::new(Semaphore::new(1));
        limit.close();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limit, concurrency_limit_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
