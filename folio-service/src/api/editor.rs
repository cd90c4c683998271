use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::pdf::EditOperation;

use super::extract::{ApiJson, AuthUser};
use super::files::FileEnvelope;
use super::{ApiResponse, ApiResult, AppState};

#[derive(Deserialize)]
pub struct ModifyRequest {
    pub operations: Vec<EditOperation>,
}

/// Apply edit operations and return the newly stored file
pub async fn modify_file_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
    ApiJson(request): ApiJson<ModifyRequest>,
) -> ApiResult<FileEnvelope> {
    let file = state
        .service
        .modify_file(&user, &file_id, request.operations)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            state.message("editor-modify-success"),
            FileEnvelope { file },
        )),
    ))
}
