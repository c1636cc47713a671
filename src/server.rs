//! HTTP surface: `GET /preview?url=<target>` and `GET /health`.

use crate::{caller_origin, Cache, PreviewError, PreviewService, DEFAULT_CACHE_CONTROL};
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5001",
    "https://oc.app",
    "https://test.oc.app",
    "https://webtest.oc.app",
];

#[derive(Clone)]
pub struct AppState {
    pub service: PreviewService,
    pub allowed_origins: Arc<[String]>,
}

impl AppState {
    pub fn new(service: PreviewService, allowed_origins: Vec<String>) -> Self {
        Self {
            service,
            allowed_origins: allowed_origins.into(),
        }
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
}

/// GET /preview?url=<encoded-url>
pub async fn get_preview(
    State(state): State<AppState>,
    Query(params): Query<PreviewQuery>,
    headers: HeaderMap,
) -> Result<Response, PreviewError> {
    let caller = caller_origin(
        header_str(&headers, header::ORIGIN),
        header_str(&headers, header::REFERER),
    );

    let preview = state
        .service
        .handle_preview(params.url.as_deref(), caller)
        .await?;

    let cache_control = HeaderValue::from_str(&preview.cache_control)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CACHE_CONTROL));

    Ok(([(header::CACHE_CONTROL, cache_control)], Json(preview.metadata)).into_response())
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "cache": state.service.cache().stats(),
    }))
}

/// Requests carrying an `Origin` outside the allow-list are refused. Callers
/// without one (server to server) pass through.
async fn enforce_allowed_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.is_allowed(origin) {
            warn!(origin = %origin, "Rejected request from origin outside the allow-list");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": format!("Origin {origin} is not permitted") })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

pub fn router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET]);

    Router::new()
        .route("/preview", get(get_preview))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_allowed_origin,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drops expired cache entries so idle ones do not hold on
/// to the byte budget.
pub fn spawn_cache_janitor(cache: Arc<Cache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            cache.purge_expired();
        }
    })
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
