//! File API endpoints.
//!
//! Multipart upload, listing, lookup, rename and soft delete of the
//! caller's PDFs.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::FileRecord;
use crate::error::ServiceError;
use crate::service::IncomingFile;

use super::extract::{ApiJson, AuthUser};
use super::{ApiResponse, ApiResult, AppState};

/// Multipart field carrying the PDFs
const UPLOAD_FIELD: &str = "files";

#[derive(Serialize)]
pub struct FileList {
    pub count: usize,
    pub files: Vec<FileRecord>,
}

impl From<Vec<FileRecord>> for FileList {
    fn from(files: Vec<FileRecord>) -> Self {
        Self {
            count: files.len(),
            files,
        }
    }
}

#[derive(Serialize)]
pub struct FileEnvelope {
    pub file: FileRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(default)]
    pub original_file_name: Option<String>,
}

pub async fn upload_files_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<FileList> {
    let invalid = |message: String| state.i18n_error(ServiceError::InvalidRequest { message });

    let mut multipart = multipart.map_err(|e| invalid(e.body_text()))?;
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        // Parameters such as charset do not change the type
        let content_type = field
            .content_type()
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .map(|mime| mime.essence_str().to_string());
        let bytes = field.bytes().await.map_err(|e| invalid(e.body_text()))?;

        uploads.push(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let files = state
        .service
        .upload_files(&user, uploads)
        .await
        .map_err(|e| state.i18n_error(e))?;

    let count = files.len().to_string();
    let message = state
        .service
        .i18n
        .format("en", "files-upload-success", &[("count", count.as_str())]);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(message, files.into())),
    ))
}

pub async fn list_files_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<FileList> {
    let files = state
        .service
        .list_files(&user)
        .map_err(|e| state.i18n_error(e))?;

    Ok((StatusCode::OK, Json(ApiResponse::data(files.into()))))
}

pub async fn get_file_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<FileEnvelope> {
    let file = state
        .service
        .get_file(&user, &id)
        .map_err(|e| state.i18n_error(e))?;

    Ok((StatusCode::OK, Json(ApiResponse::data(FileEnvelope { file }))))
}

pub async fn update_file_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateFileRequest>,
) -> ApiResult<FileEnvelope> {
    let file = state
        .service
        .rename_file(&user, &id, request.original_file_name.as_deref())
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(
            state.message("file-update-success"),
            FileEnvelope { file },
        )),
    ))
}

pub async fn delete_file_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state
        .service
        .delete_file(&user, &id)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::message_only(
            state.message("file-delete-success"),
        )),
    ))
}
