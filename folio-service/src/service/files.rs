//! Upload, listing, rename and soft delete of stored PDFs.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{FileRecord, FileStatus, User};
use crate::error::{PdfError, ServiceError, ServiceResult, format_error_chain};
use crate::pdf::{self, PdfSummary};
use crate::service::FolioService;
use crate::storage::{FileStore, StoredKind, compute_checksum};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// One part of a multipart upload
#[derive(Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FolioService {
    /// Store every acceptable PDF in the batch.
    ///
    /// Parts that are not PDFs, exceed the size limit, fail to parse, have no
    /// pages or fail to persist are skipped individually; the rest of the
    /// batch carries on.
    pub async fn upload_files(
        &self,
        user: &User,
        uploads: Vec<IncomingFile>,
    ) -> ServiceResult<Vec<FileRecord>> {
        let limits = &self.config.limits;

        if uploads.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "No files uploaded".to_string(),
            });
        }
        if uploads.len() > limits.max_files_per_upload {
            return Err(ServiceError::InvalidRequest {
                message: format!(
                    "Too many files; at most {} per upload",
                    limits.max_files_per_upload
                ),
            });
        }

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if upload.content_type.as_deref() != Some(PDF_MIME_TYPE) {
                warn!(
                    user_id = %user.id,
                    file_name = %upload.file_name,
                    content_type = ?upload.content_type,
                    "Skipping non-PDF upload"
                );
                continue;
            }
            if upload.bytes.len() as u64 > limits.max_file_size_bytes {
                warn!(
                    user_id = %user.id,
                    file_name = %upload.file_name,
                    size = upload.bytes.len(),
                    max = limits.max_file_size_bytes,
                    "Skipping oversized upload"
                );
                continue;
            }

            match self.store_upload(user, upload).await {
                Ok(record) => stored.push(record),
                Err((file_name, e)) => {
                    warn!(
                        user_id = %user.id,
                        file_name = %file_name,
                        error = %format_error_chain(&e),
                        "Skipping upload that could not be stored"
                    );
                }
            }
        }

        metrics::counter!("folio_files_uploaded_total").increment(stored.len() as u64);
        info!(user_id = %user.id, count = stored.len(), "Files uploaded");

        Ok(stored)
    }

    async fn store_upload(
        &self,
        user: &User,
        upload: IncomingFile,
    ) -> Result<FileRecord, (String, ServiceError)> {
        let IncomingFile {
            file_name, bytes, ..
        } = upload;

        let (bytes, summary) = Self::run_blocking(move || {
            let summary = pdf::inspect(&bytes)?;
            if summary.page_count == 0 {
                return Err(PdfError::EmptyDocument.into());
            }
            Ok((bytes, summary))
        })
        .await
        .map_err(|e| (file_name.clone(), e))?;

        let stored_name = FileStore::new_stored_name(StoredKind::Upload);
        self.persist_file(user, &file_name, &stored_name, &bytes, summary)
            .await
            .map_err(|e| (file_name, e))
    }

    /// Write a binary and record it. The binary is removed again if the
    /// record cannot be written.
    pub(crate) async fn persist_file(
        &self,
        user: &User,
        display_name: &str,
        stored_name: &str,
        bytes: &[u8],
        summary: PdfSummary,
    ) -> ServiceResult<FileRecord> {
        let record = self.new_file_record(user, display_name, stored_name, bytes, summary);

        self.store.write(stored_name, bytes).await?;

        if let Err(e) = self.db.insert_file(&record) {
            self.store.discard(stored_name).await;
            return Err(e);
        }

        debug!(
            file_id = %record.id,
            stored_file_name = %stored_name,
            size = record.file_size,
            "Stored file"
        );

        Ok(record)
    }

    pub(crate) fn new_file_record(
        &self,
        user: &User,
        display_name: &str,
        stored_name: &str,
        bytes: &[u8],
        summary: PdfSummary,
    ) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            original_file_name: display_name.to_string(),
            stored_file_name: stored_name.to_string(),
            file_url: FileStore::url_for(stored_name),
            file_size: bytes.len() as u64,
            mime_type: PDF_MIME_TYPE.to_string(),
            checksum: compute_checksum(bytes),
            upload_timestamp: now,
            status: FileStatus::Active,
            metadata: summary.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The caller's active files, newest upload first
    pub fn list_files(&self, user: &User) -> ServiceResult<Vec<FileRecord>> {
        self.db.list_active_files(&user.id)
    }

    /// One of the caller's files, whatever its status
    pub fn get_file(&self, user: &User, file_id: &str) -> ServiceResult<FileRecord> {
        self.db
            .get_owned_file(file_id, &user.id)?
            .ok_or_else(|| ServiceError::FileNotFound {
                file_id: file_id.to_string(),
            })
    }

    /// Rename a file. A missing or blank name leaves it unchanged.
    pub fn rename_file(
        &self,
        user: &User,
        file_id: &str,
        name: Option<&str>,
    ) -> ServiceResult<FileRecord> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            if !self.db.rename_file(file_id, &user.id, name)? {
                return Err(ServiceError::FileNotFound {
                    file_id: file_id.to_string(),
                });
            }
        }

        self.get_file(user, file_id)
    }

    /// Soft-delete a file and remove its binary on a best-effort basis.
    ///
    /// The record stays so merge history that references it keeps resolving.
    pub async fn delete_file(&self, user: &User, file_id: &str) -> ServiceResult<()> {
        let file = self.get_file(user, file_id)?;

        self.db
            .set_file_status(file_id, &user.id, FileStatus::Deleted)?;
        self.store.discard(&file.stored_file_name).await;

        info!(user_id = %user.id, file_id = %file_id, "File deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::sample_pdf;
    use crate::service::testing::{registered_user, test_service};

    fn pdf_part(name: &str, widths: &[i64]) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            content_type: Some(PDF_MIME_TYPE.to_string()),
            bytes: sample_pdf(widths),
        }
    }

    #[tokio::test]
    async fn test_upload_skips_bad_parts() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;

        let uploads = vec![
            pdf_part("good.pdf", &[300, 400]),
            IncomingFile {
                file_name: "notes.txt".to_string(),
                content_type: Some("text/plain".to_string()),
                bytes: b"hello".to_vec(),
            },
            IncomingFile {
                file_name: "fake.pdf".to_string(),
                content_type: Some(PDF_MIME_TYPE.to_string()),
                bytes: b"not really a pdf".to_vec(),
            },
        ];

        let stored = service.upload_files(&user, uploads).await.unwrap();
        assert_eq!(stored.len(), 1);

        let file = &stored[0];
        assert_eq!(file.original_file_name, "good.pdf");
        assert_eq!(file.metadata.page_count, 2);
        assert_eq!(file.metadata.width, Some(300.0));
        assert!(file.stored_file_name.starts_with("upload-"));
        assert_eq!(file.file_url, format!("/uploads/{}", file.stored_file_name));
        assert!(service.store.exists(&file.stored_file_name).await.unwrap());

        // Only the accepted binary reached the upload directory
        let entries = std::fs::read_dir(service.store.root()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_upload_skips_documents_without_pages() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;

        let uploads = vec![pdf_part("empty.pdf", &[]), pdf_part("one.pdf", &[200])];

        let stored = service.upload_files(&user, uploads).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].original_file_name, "one.pdf");
        assert_eq!(service.list_files(&user).unwrap().len(), 1);

        let entries = std::fs::read_dir(service.store.root()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;

        let err = service.upload_files(&user, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        let too_many = (0..11).map(|i| pdf_part(&format!("{i}.pdf"), &[100])).collect();
        let err = service.upload_files(&user, too_many).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_same_binary_twice_gets_two_identities() {
        let (service, _dir) = test_service().await;
        let user = registered_user(&service, "u@example.com").await;

        let part = pdf_part("same.pdf", &[100]);
        let again = IncomingFile {
            file_name: part.file_name.clone(),
            content_type: part.content_type.clone(),
            bytes: part.bytes.clone(),
        };

        let stored = service.upload_files(&user, vec![part, again]).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].id, stored[1].id);
        assert_ne!(stored[0].stored_file_name, stored[1].stored_file_name);
        assert_eq!(stored[0].checksum, stored[1].checksum);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let (service, _dir) = test_service().await;
        let owner = registered_user(&service, "owner@example.com").await;
        let other = registered_user(&service, "other@example.com").await;

        let file = service
            .upload_files(&owner, vec![pdf_part("a.pdf", &[100])])
            .await
            .unwrap()
            .remove(0);

        let renamed = service
            .rename_file(&owner, &file.id, Some("  report.pdf "))
            .unwrap();
        assert_eq!(renamed.original_file_name, "report.pdf");

        let unchanged = service.rename_file(&owner, &file.id, Some("   ")).unwrap();
        assert_eq!(unchanged.original_file_name, "report.pdf");

        assert!(matches!(
            service.rename_file(&other, &file.id, Some("mine.pdf")),
            Err(ServiceError::FileNotFound { .. })
        ));
        assert!(matches!(
            service.delete_file(&other, &file.id).await,
            Err(ServiceError::FileNotFound { .. })
        ));

        service.delete_file(&owner, &file.id).await.unwrap();
        assert!(service.list_files(&owner).unwrap().is_empty());
        assert!(!service.store.exists(&file.stored_file_name).await.unwrap());

        let deleted = service.get_file(&owner, &file.id).unwrap();
        assert_eq!(deleted.status, FileStatus::Deleted);
    }
}
