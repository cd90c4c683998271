use tracing::info;

use crate::db::{FileRecord, User};
use crate::error::{ServiceError, ServiceResult};
use crate::pdf::{self, EditOperation};
use crate::service::FolioService;
use crate::storage::{FileStore, StoredKind};

const EDITED_NAME_PREFIX: &str = "Edited_";

impl FolioService {
    /// Apply edit operations to one of the caller's active files and store
    /// the outcome as a new file. The source file is left untouched.
    pub async fn modify_file(
        &self,
        user: &User,
        file_id: &str,
        operations: Vec<EditOperation>,
    ) -> ServiceResult<FileRecord> {
        let source = self
            .db
            .get_active_file(file_id, &user.id)?
            .ok_or_else(|| ServiceError::FileNotFound {
                file_id: file_id.to_string(),
            })?;

        let bytes = self.store.read(&source.stored_file_name).await?;
        let operation_count = operations.len();

        let edited =
            Self::run_blocking(move || Ok(pdf::apply_operations(&bytes, &operations)?)).await?;

        let stored_name = FileStore::new_stored_name(StoredKind::Edited);
        let display_name = format!("{}{}", EDITED_NAME_PREFIX, source.original_file_name);
        let record = self
            .persist_file(user, &display_name, &stored_name, &edited.bytes, edited.summary)
            .await?;

        metrics::counter!("folio_files_edited_total").increment(1);
        info!(
            user_id = %user.id,
            source_file_id = %source.id,
            file_id = %record.id,
            operations = operation_count,
            pages = record.metadata.page_count,
            "File modified"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::pdf::testing::{page_widths, sample_pdf};
    use crate::service::IncomingFile;
    use crate::service::testing::{registered_user, test_service};
    use serde_json::json;

    fn ops(value: serde_json::Value) -> Vec<EditOperation> {
        serde_json::from_value(value).unwrap()
    }

    async fn uploaded(service: &FolioService, user: &User, widths: &[i64]) -> FileRecord {
        service
            .upload_files(
                user,
                vec![IncomingFile {
                    file_name: "source.pdf".to_string(),
                    content_type: Some("application/pdf".to_string()),
                    bytes: sample_pdf(widths),
                }],
            )
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_modify_creates_new_file() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;
        let source = uploaded(&service, &user, &[100, 200, 300]).await;

        let edited = service
            .modify_file(
                &user,
                &source.id,
                ops(json!([
                    {"type": "addText", "pageIndex": 0, "text": "Hi", "x": 5, "y": 5},
                    {"type": "deletePage", "pageIndex": 2},
                    {"type": "deletePage", "pageIndex": 0}
                ])),
            )
            .await
            .unwrap();

        assert_eq!(edited.original_file_name, "Edited_source.pdf");
        assert!(edited.stored_file_name.starts_with("edited-"));
        assert_eq!(edited.metadata.page_count, 1);
        assert_ne!(edited.id, source.id);

        let bytes = service.store.read(&edited.stored_file_name).await.unwrap();
        assert_eq!(page_widths(&bytes), vec![200.0]);

        // Source binary and record are unchanged
        let original = service.store.read(&source.stored_file_name).await.unwrap();
        assert_eq!(page_widths(&original), vec![100.0, 200.0, 300.0]);
        assert_eq!(service.list_files(&user).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_modify_requires_owned_active_file() {
        let (service, _dir) = test_service().await;
        let owner = registered_user(&service, "owner@example.com").await;
        let other = registered_user(&service, "other@example.com").await;
        let source = uploaded(&service, &owner, &[100]).await;

        let err = service
            .modify_file(&other, &source.id, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FileNotFound { .. }));

        service.delete_file(&owner, &source.id).await.unwrap();
        let err = service
            .modify_file(&owner, &source.id, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_operations_leave_no_trace() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;
        let source = uploaded(&service, &user, &[100, 200]).await;

        let err = service
            .modify_file(
                &user,
                &source.id,
                ops(json!([{"type": "rotatePage", "pageIndex": 0, "rotation": 45}])),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Pdf(PdfError::InvalidRotation { degrees: 45 })
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(service.list_files(&user).unwrap().len(), 1);
        let entries = std::fs::read_dir(service.store.root()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
