//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, limits, timeout, auth)
//! - Load clusters and start the refresh monitor
//! - Apply hot-reloaded configuration
//! - Serve plain HTTP or TLS until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::Request as HttpRequest,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::cluster::{ClusterRegistry, RefreshMonitor};
use crate::config::{ServiceConfig, TlsConfig};
use crate::http::auth::api_auth_middleware;
use crate::http::handlers;
use crate::http::limits::concurrency_limit_middleware;
use crate::http::request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::shutdown::signalled;
use crate::observability::metrics;

/// Error type for running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClusterRegistry>,
    pub config: Arc<ArcSwap<ServiceConfig>>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            registry: Arc::new(ClusterRegistry::new()),
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Swap in a reloaded config and reconcile the cluster list.
    ///
    /// Sections wired up at startup keep their old values until restart.
    pub async fn apply_config(&self, new_config: ServiceConfig) {
        let current = self.config.load_full();
        let pending = restart_required(&current, &new_config);
        if !pending.is_empty() {
            tracing::warn!(
                settings = %pending.join(", "),
                "Changed settings take effect after restart"
            );
        }

        let clusters = new_config.clusters.clone();
        self.config.store(Arc::new(new_config));
        self.registry.apply(&clusters).await;
        tracing::info!(clusters = self.registry.len(), "Configuration reloaded");
    }
}

/// HTTP server for the CRUSH rule API.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Clusters are loaded when `run` starts.
    pub fn new(config: ServiceConfig) -> Self {
        let state = AppState::new(config.clone());
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/api/v2/cluster", get(handlers::list_clusters))
            .route("/api/v2/cluster/{fsid}", get(handlers::get_cluster))
            .route(
                "/api/v2/cluster/{fsid}/crush_rule_set",
                get(handlers::list_rule_sets),
            )
            .route("/api/v2/cluster/{fsid}/crush_rule", get(handlers::list_rules))
            .route(
                "/api/v2/cluster/{fsid}/crush_rule/{rule_id}",
                get(handlers::get_rule),
            )
            .layer(middleware::from_fn_with_state(
                state.clone(),
                api_auth_middleware,
            ));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .merge(api);

        if config.admin.enabled {
            router = router.merge(admin::admin_router(state.clone()));
        }

        let router = router
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state);
        Self::apply_layers(router, config)
    }

    /// Wrap `router` in the request-id, trace, limit, timeout and body-size layers.
    #[allow(deprecated)]
    fn apply_layers(router: Router, config: &ServiceConfig) -> Router {
        router
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(
                Arc::new(Semaphore::new(config.listener.max_connections)),
                concurrency_limit_middleware,
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &HttpRequest<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request.headers().request_id(),
                    )
                }),
            )
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Loads every configured cluster first, then serves. Accepted configs
    /// arriving on `config_updates` are applied while running.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;

        self.state.registry.apply(&self.config.clusters).await;
        tracing::info!(
            clusters = self.state.registry.len(),
            "Cluster inventory loaded"
        );

        let monitor = RefreshMonitor::new(self.state.registry.clone(), self.config.inventory.clone());
        let refresh_task = tokio::spawn(monitor.run(shutdown.resubscribe()));
        let reload_task = tokio::spawn(watch_config_updates(
            self.state.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tracing::info!(address = %addr, tls = self.config.listener.tls.is_some(), "HTTP server starting");

        let result = match &self.config.listener.tls {
            Some(tls) => serve_tls(listener, self.router, tls, grace, shutdown).await,
            None => serve_plain(listener, self.router, grace, shutdown).await,
        };

        refresh_task.abort();
        reload_task.abort();

        tracing::info!("HTTP server stopped");
        result.map_err(ServerError::from)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared state, for callers that need the registry.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Settings whose change `apply_config` cannot pick up live.
fn restart_required(current: &ServiceConfig, new: &ServiceConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.listener != new.listener {
        changed.push("listener");
    }
    if current.timeouts != new.timeouts {
        changed.push("timeouts");
    }
    if current.security.max_body_size != new.security.max_body_size {
        changed.push("security.max_body_size");
    }
    if current.admin.enabled != new.admin.enabled {
        changed.push("admin.enabled");
    }
    if current.inventory != new.inventory {
        changed.push("inventory");
    }
    if current.observability != new.observability {
        changed.push("observability");
    }
    changed
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    metrics::record_request(&endpoint, response.status().as_u16(), start);
    response
}

async fn watch_config_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<ServiceConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(new_config) => state.apply_config(new_config).await,
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    grace: Duration,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let deadline = shutdown.resubscribe();
    let serve = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signalled(shutdown))
            .await
    };

    tokio::select! {
        result = serve => result,
        _ = async move {
            signalled(deadline).await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, dropping open connections");
            Ok(())
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    grace: Duration,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

    let handle = axum_server::Handle::new();
    let stopper = handle.clone();
    tokio::spawn(async move {
        signalled(shutdown).await;
        stopper.graceful_shutdown(Some(grace));
    });

    axum_server::from_tcp_rustls(listener.into_std()?, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let mut config = ServiceConfig::default();
        config.timeouts.request_secs = 1;
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let app = HttpServer::apply_layers(router, &config);

        let response = app
            .oneshot(HttpRequest::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = ServiceConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "admin-secret".into();
        config.security.max_body_size = 16;
        let app = HttpServer::new(config).router();

        let body = vec![b'x'; 64];
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/admin/refresh")
                    .header(header::AUTHORIZATION, "Bearer admin-secret")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_small_body_passes_limit() {
        let mut config = ServiceConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "admin-secret".into();
        config.security.max_body_size = 16;
        let app = HttpServer::new(config).router();

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/admin/refresh")
                    .header(header::AUTHORIZATION, "Bearer admin-secret")
                    .header(header::CONTENT_LENGTH, 2)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_restart_required_lists_startup_settings() {
        let current = ServiceConfig::default();
        assert!(restart_required(&current, &current.clone()).is_empty());

        let mut new = current.clone();
        new.admin.enabled = true;
        new.admin.api_key = "rotated".into();
        new.inventory.refresh_interval_secs = 5;
        new.timeouts.shutdown_grace_secs = 3;
        assert_eq!(
            restart_required(&current, &new),
            vec!["timeouts", "admin.enabled", "inventory"]
        );
    }

    #[test]
    fn test_live_settings_do_not_need_restart() {
        let current = ServiceConfig::default();
        let mut new = current.clone();
        new.security.api_key = Some("token".into());
        new.admin.api_key = "rotated".into();
        assert!(restart_required(&current, &new).is_empty());
    }
}
