//! Merge API endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::service::{AnnotationRequest, MergeRequest, MergeResult, MergeView};

use super::extract::{ApiJson, AuthUser};
use super::{ApiResponse, ApiResult, AppState};

#[derive(Serialize)]
pub struct MergeHistory {
    pub count: usize,
    pub operations: Vec<MergeView>,
}

#[derive(Serialize)]
pub struct OperationEnvelope {
    pub operation: MergeView,
}

pub async fn merge_files_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<MergeRequest>,
) -> ApiResult<MergeResult> {
    let result = state
        .service
        .merge_files(&user, request)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            state.message("merge-success"),
            result,
        )),
    ))
}

pub async fn merge_history_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<MergeHistory> {
    let operations = state
        .service
        .merge_history(&user)
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::data(MergeHistory {
            count: operations.len(),
            operations,
        })),
    ))
}

pub async fn get_merge_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<OperationEnvelope> {
    let operation = state
        .service
        .get_merge(&user, &id)
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::data(OperationEnvelope { operation })),
    ))
}

pub async fn annotate_merge_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AnnotationRequest>,
) -> ApiResult<OperationEnvelope> {
    let operation = state
        .service
        .annotate_merge(&user, &id, request)
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(
            state.message("merge-annotate-success"),
            OperationEnvelope { operation },
        )),
    ))
}
