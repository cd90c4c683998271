//! Merging stored files, merge history and annotations.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{
    Annotation, AnnotationKind, AnnotationPosition, CompressionLevel, FileRecord,
    MergeConfiguration, MergeOperation, MergeStatus, User,
};
use crate::error::{ServiceError, ServiceResult};
use crate::pdf;
use crate::service::FolioService;
use crate::storage::{FileStore, StoredKind};

const MIN_MERGE_SOURCES: usize = 2;
const HISTORY_LIMIT: usize = 50;

/// Body of a merge request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub operation_name: String,
    #[serde(default)]
    pub compression_level: CompressionLevel,
}

/// Body of an annotate request. The type is kept as text so an unknown
/// value is reported as a validation error instead of a body rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub position: AnnotationPosition,
}

/// A merge operation with its source and result files resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeView {
    #[serde(flatten)]
    pub operation: MergeOperation,
    /// Source records in merge order
    pub source_files: Vec<FileRecord>,
    pub merged_file: Option<FileRecord>,
}

/// Outcome of a successful merge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub merge_operation: MergeOperation,
    pub merged_file: FileRecord,
}

impl FolioService {
    /// Concatenate the caller's files, in request order, into a new file
    /// and record the operation.
    pub async fn merge_files(&self, user: &User, request: MergeRequest) -> ServiceResult<MergeResult> {
        let operation_name = request.operation_name.trim().to_string();
        if request.file_ids.len() < MIN_MERGE_SOURCES {
            return Err(ServiceError::InvalidRequest {
                message: "Please provide at least two files to merge".to_string(),
            });
        }
        if operation_name.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Please provide an operation name".to_string(),
            });
        }

        let sources = self.resolve_sources(user, &request.file_ids)?;

        // Check every binary before reading any
        for source in &sources {
            if !self.store.exists(&source.stored_file_name).await? {
                return Err(ServiceError::FileMissingOnDisk {
                    name: source.original_file_name.clone(),
                });
            }
        }

        let mut inputs = Vec::with_capacity(sources.len());
        for source in &sources {
            inputs.push(self.store.read(&source.stored_file_name).await?);
        }

        let compression = request.compression_level;
        let merged =
            Self::run_blocking(move || Ok(pdf::merge_documents(&inputs, compression)?)).await?;

        let stored_name = FileStore::new_stored_name(StoredKind::Merged);
        let display_name = format!("{}.pdf", operation_name);
        let merged_file = self.new_file_record(
            user,
            &display_name,
            &stored_name,
            &merged.bytes,
            merged.summary,
        );

        let now = Utc::now();
        let merge_operation = MergeOperation {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            operation_name,
            source_file_ids: sources.iter().map(|s| s.id.clone()).collect(),
            merged_file_id: merged_file.id.clone(),
            merge_configuration: MergeConfiguration {
                file_order: sources.iter().map(|s| s.original_file_name.clone()).collect(),
                total_pages: merged.page_counts.iter().sum::<usize>() as u32,
                compression_level: compression,
            },
            annotations: Vec::new(),
            status: MergeStatus::Completed,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        self.store.write(&stored_name, &merged.bytes).await?;
        if let Err(e) = self.db.insert_merge_result(&merged_file, &merge_operation) {
            self.store.discard(&stored_name).await;
            return Err(e);
        }

        metrics::counter!("folio_merges_total").increment(1);
        info!(
            user_id = %user.id,
            merge_id = %merge_operation.id,
            file_id = %merged_file.id,
            sources = sources.len(),
            pages = merge_operation.merge_configuration.total_pages,
            "Files merged"
        );

        Ok(MergeResult {
            merge_operation,
            merged_file,
        })
    }

    /// Active files owned by `user`, in request order.
    ///
    /// Every id must name a distinct file; a repeated id counts as missing.
    fn resolve_sources(&self, user: &User, file_ids: &[String]) -> ServiceResult<Vec<FileRecord>> {
        let mut found: HashMap<String, FileRecord> = self
            .db
            .get_files_by_ids(file_ids)?
            .into_iter()
            .filter(|file| file.user_id == user.id && file.is_active())
            .map(|file| (file.id.clone(), file))
            .collect();

        if found.len() != file_ids.len() {
            return Err(ServiceError::FilesNotFound);
        }

        file_ids
            .iter()
            .map(|id| found.remove(id).ok_or(ServiceError::FilesNotFound))
            .collect()
    }

    /// The caller's most recent merges, newest first
    pub fn merge_history(&self, user: &User) -> ServiceResult<Vec<MergeView>> {
        let merges = self.db.list_merges(&user.id, HISTORY_LIMIT)?;
        self.resolve_views(merges)
    }

    pub fn get_merge(&self, user: &User, merge_id: &str) -> ServiceResult<MergeView> {
        let merge = self
            .db
            .get_merge(merge_id, &user.id)?
            .ok_or_else(|| ServiceError::MergeNotFound {
                merge_id: merge_id.to_string(),
            })?;

        let mut views = self.resolve_views(vec![merge])?;
        views.pop().ok_or_else(|| ServiceError::MergeNotFound {
            merge_id: merge_id.to_string(),
        })
    }

    /// Attach an annotation to one of the caller's merges
    pub fn annotate_merge(
        &self,
        user: &User,
        merge_id: &str,
        request: AnnotationRequest,
    ) -> ServiceResult<MergeView> {
        let kind = AnnotationKind::from_str(request.kind.trim()).map_err(|_| {
            ServiceError::InvalidRequest {
                message: "Invalid annotation type".to_string(),
            }
        })?;

        let annotation = Annotation {
            id: Uuid::new_v4().to_string(),
            kind,
            content: request.content,
            position: request.position,
            created_at: Utc::now(),
        };

        if !self.db.add_annotation(merge_id, &user.id, &annotation)? {
            return Err(ServiceError::MergeNotFound {
                merge_id: merge_id.to_string(),
            });
        }

        debug!(user_id = %user.id, merge_id = %merge_id, kind = kind.as_ref(), "Annotation added");

        self.get_merge(user, merge_id)
    }

    /// Populate source and merged file records, including soft-deleted ones
    fn resolve_views(&self, merges: Vec<MergeOperation>) -> ServiceResult<Vec<MergeView>> {
        let mut ids: Vec<String> = Vec::new();
        for merge in &merges {
            ids.extend(merge.source_file_ids.iter().cloned());
            ids.push(merge.merged_file_id.clone());
        }

        let files: HashMap<String, FileRecord> = self
            .db
            .get_files_by_ids(&ids)?
            .into_iter()
            .map(|file| (file.id.clone(), file))
            .collect();

        let views = merges
            .into_iter()
            .map(|operation| {
                let source_files = operation
                    .source_file_ids
                    .iter()
                    .filter_map(|id| files.get(id).cloned())
                    .collect();
                let merged_file = files.get(&operation.merged_file_id).cloned();

                MergeView {
                    operation,
                    source_files,
                    merged_file,
                }
            })
            .collect();

        Ok(views)
    }
}
