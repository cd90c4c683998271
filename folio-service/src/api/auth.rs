//! Registration, login and logout endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::service::AuthSession;

use super::extract::ApiJson;
use super::{ApiResponse, ApiResult, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<AuthSession> {
    let session = state
        .service
        .register(&request.full_name, &request.email, &request.password)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            state.message("auth-register-success"),
            session,
        )),
    ))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<AuthSession> {
    let session = state
        .service
        .login(&request.email, &request.password)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(
            state.message("auth-login-success"),
            session,
        )),
    ))
}

/// Tokens are not tracked server side; the client discards its own
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message_only(
            state.message("auth-logout-success"),
        )),
    ))
}
