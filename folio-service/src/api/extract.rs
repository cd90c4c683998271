//! Request extractors that report failures in the API envelope.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::de::DeserializeOwned;

use crate::db::User;
use crate::error::{AuthError, I18nError, ServiceError};

use super::AppState;

/// The active user behind the request's bearer token
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = I18nError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| state.i18n_error(AuthError::MissingToken.into()))?;

        let user = state
            .service
            .authenticate(bearer.token())
            .map_err(|e| state.i18n_error(e))?;

        Ok(AuthUser(user))
    }
}

/// JSON body whose rejections become 400 validation errors
pub struct ApiJson<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = I18nError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(state.i18n_error(ServiceError::InvalidRequest {
                message: rejection.body_text(),
            })),
        }
    }
}
