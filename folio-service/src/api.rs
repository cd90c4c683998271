//! HTTP API for the Folio service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Registration and login
//! - File upload and management
//! - PDF editing
//! - Merging and merge history
//!
//! Resource routes live under `/api/v1`; stored binaries are served
//! statically under `/uploads`.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{I18nError, ServiceError};
use crate::service::FolioService;
use crate::storage::UPLOADS_ROUTE;

pub mod auth;
pub mod editor;
mod extract;
pub mod files;
pub mod merge;

use auth::{login_handler, logout_handler, register_handler};
use editor::modify_file_handler;
use files::{
    delete_file_handler, get_file_handler, list_files_handler, update_file_handler,
    upload_files_handler,
};
use merge::{annotate_merge_handler, get_merge_handler, merge_files_handler, merge_history_handler};

/// Application state
pub struct AppState {
    pub service: Arc<FolioService>,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), "en")
    }

    /// Look up a translated success message
    pub fn message(&self, key: &str) -> String {
        self.service.i18n.get("en", key, None)
    }
}

/// Success envelope shared by every resource endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: String, data: T) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: None,
        }
    }
}

/// Handler result: a status, the envelope, or a translated error
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), I18nError>;

/// Build the API router
pub fn router(service: Arc<FolioService>, metrics: Option<PrometheusHandle>) -> Router {
    let upload_dir = service.store.root().to_path_buf();
    // Edit requests may carry base64 images, so they share the upload limit
    let max_body_size = service.config.limits.max_upload_body_bytes();

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Auth endpoints
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        // File endpoints
        .route(
            "/files/upload",
            post(upload_files_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/files", get(list_files_handler))
        .route(
            "/files/{id}",
            get(get_file_handler)
                .put(update_file_handler)
                .delete(delete_file_handler),
        )
        // Editor endpoint
        .route(
            "/editor/{file_id}/modify",
            post(modify_file_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        // Merge endpoints
        .route("/merge", post(merge_files_handler))
        .route("/merge/history", get(merge_history_handler))
        .route("/merge/{id}", get(get_merge_handler))
        .route("/merge/{id}/annotate", post(annotate_merge_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(upload_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: state.message("health-status-healthy"),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
