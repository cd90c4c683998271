use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    #[error("One or more files not found")]
    FilesNotFound,

    #[error("File {name} not found on disk")]
    FileMissingOnDisk { name: String },

    #[error("Merge operation not found: {merge_id}")]
    MergeNotFound { merge_id: String },

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("PDF processing failed")]
    Pdf(#[from] PdfError),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Authentication and account errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid bearer token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Bearer token has expired")]
    TokenExpired,

    #[error("Token subject no longer exists")]
    UnknownUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountInactive,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Password hashing failed: {message}")]
    PasswordHash { message: String },

    #[error("Token signing failed")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// PDF load, mutation and write errors
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF")]
    Load(#[source] lopdf::Error),

    #[error("Failed to write PDF: {message}")]
    Save { message: String },

    #[error("Malformed PDF structure: {message}")]
    Structure { message: String },

    #[error("Page index {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: u32, page_count: usize },

    #[error("Rotation must be a multiple of 90 degrees, got {degrees}")]
    InvalidRotation { degrees: i64 },

    #[error("Operations would delete every page of the document")]
    NoPagesRemaining,

    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Invalid base64 image data")]
    ImageEncoding(#[source] base64::DecodeError),

    #[error("Failed to decode image")]
    ImageDecode(#[source] image::ImageError),
}

impl PdfError {
    /// Errors caused by the request rather than by the document or the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PdfError::PageOutOfRange { .. }
                | PdfError::InvalidRotation { .. }
                | PdfError::NoPagesRemaining
        )
    }
}

/// Upload directory errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O failure on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed")]
    Task(#[source] tokio::task::JoinError),
}

/// API error response, the failure half of the response envelope
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::FileNotFound { .. }
            | ServiceError::FilesNotFound
            | ServiceError::FileMissingOnDisk { .. }
            | ServiceError::MergeNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Auth(AuthError::EmailTaken) => StatusCode::BAD_REQUEST,
            ServiceError::Auth(AuthError::AccountInactive) => StatusCode::FORBIDDEN,
            ServiceError::Auth(AuthError::PasswordHash { .. })
            | ServiceError::Auth(AuthError::TokenSigning(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Pdf(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::FileNotFound { .. } => "file_not_found",
            ServiceError::FilesNotFound => "files_not_found",
            ServiceError::FileMissingOnDisk { .. } => "file_missing_on_disk",
            ServiceError::MergeNotFound { .. } => "merge_not_found",
            ServiceError::Auth(AuthError::MissingToken) => "missing_token",
            ServiceError::Auth(AuthError::InvalidToken(_)) => "invalid_token",
            ServiceError::Auth(AuthError::TokenExpired) => "token_expired",
            ServiceError::Auth(AuthError::UnknownUser) => "invalid_token",
            ServiceError::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            ServiceError::Auth(AuthError::AccountInactive) => "account_inactive",
            ServiceError::Auth(AuthError::EmailTaken) => "email_taken",
            ServiceError::Auth(AuthError::PasswordHash { .. })
            | ServiceError::Auth(AuthError::TokenSigning(_)) => "internal_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Pdf(PdfError::PageOutOfRange { .. }) => "page_out_of_range",
            ServiceError::Pdf(PdfError::InvalidRotation { .. }) => "invalid_rotation",
            ServiceError::Pdf(PdfError::NoPagesRemaining) => "no_pages_remaining",
            ServiceError::Pdf(_) => "processing_error",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
        }
    }

    /// Get a user-friendly translated message.
    ///
    /// Server errors never expose their cause; it is logged instead.
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::FileNotFound { .. } => i18n.get(locale, "error-file-not-found", None),
            ServiceError::FilesNotFound => i18n.get(locale, "error-files-not-found", None),
            ServiceError::FileMissingOnDisk { name } => {
                i18n.format(locale, "error-file-missing-on-disk", &[("name", name.as_str())])
            }
            ServiceError::MergeNotFound { .. } => i18n.get(locale, "error-merge-not-found", None),
            ServiceError::Auth(AuthError::InvalidCredentials) => {
                i18n.get(locale, "error-invalid-credentials", None)
            }
            ServiceError::Auth(AuthError::AccountInactive) => {
                i18n.get(locale, "error-account-inactive", None)
            }
            ServiceError::Auth(AuthError::EmailTaken) => i18n.get(locale, "error-email-taken", None),
            ServiceError::Auth(AuthError::TokenExpired) => {
                i18n.get(locale, "error-token-expired", None)
            }
            ServiceError::Auth(AuthError::MissingToken)
            | ServiceError::Auth(AuthError::InvalidToken(_))
            | ServiceError::Auth(AuthError::UnknownUser) => {
                i18n.get(locale, "error-unauthorized", None)
            }
            ServiceError::InvalidRequest { message } => message.clone(),
            ServiceError::Pdf(e) if e.is_client_error() => e.to_string(),
            ServiceError::Pdf(_) => i18n.get(locale, "error-processing", None),
            _ => i18n.get(locale, "error-internal", None),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            success: false,
            error: self.user_message(i18n, locale),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Render an error and all of its sources as a single line.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}
