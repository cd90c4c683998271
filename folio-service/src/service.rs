//! Service layer: every REST operation as an async method on
//! [`FolioService`], split across submodules by resource.

mod accounts;
mod editor;
mod files;
mod merge;

pub use accounts::AuthSession;
pub use files::IncomingFile;
pub use merge::{AnnotationRequest, MergeRequest, MergeResult, MergeView};

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::TokenKeys;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{ServiceResult, StorageError};
use crate::i18n::I18n;
use crate::storage::FileStore;

/// Main service coordinator
pub struct FolioService {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    pub store: FileStore,
    pub tokens: TokenKeys,
    pub i18n: Arc<I18n>,
}

impl FolioService {
    /// Create a new service instance around an opened database
    pub async fn new(config: Arc<AppConfig>, db: Arc<Database>) -> ServiceResult<Self> {
        info!("Initializing Folio service");

        let store = FileStore::new(&config.storage.upload_dir);
        store.ensure_root().await?;
        info!(upload_dir = %store.root().display(), "Upload directory ready");

        let ttl = config.auth.token_ttl();
        let tokens = match config.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => TokenKeys::new(secret.as_bytes(), ttl),
            _ => {
                warn!("No auth.jwt_secret configured; using a random secret, tokens will not survive a restart");
                TokenKeys::ephemeral(ttl)
            }
        };

        Ok(Self {
            config,
            db,
            store,
            tokens,
            i18n: Arc::new(I18n::new()),
        })
    }

    /// Run CPU-bound work on the blocking pool
    async fn run_blocking<T, F>(work: F) -> ServiceResult<T>
    where
        F: FnOnce() -> ServiceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(StorageError::Task)?
    }
}
