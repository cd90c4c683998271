//! Merge operation history.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use super::files::insert_file_with;
use super::models::{Annotation, FileRecord, MergeOperation};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Record a finished merge: the merged file and the operation that
    /// produced it are committed together or not at all.
    pub fn insert_merge_result(
        &self,
        merged_file: &FileRecord,
        merge: &MergeOperation,
    ) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        insert_file_with(&tx, merged_file)?;

        let file_order_json = serde_json::to_string(&merge.merge_configuration.file_order)
            .map_err(DatabaseError::Serialization)?;

        tx.execute(
            r#"
            INSERT INTO merge_operations (id, user_id, operation_name, merged_file_id, file_order, total_pages, compression_level, status, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                merge.id,
                merge.user_id,
                merge.operation_name,
                merge.merged_file_id,
                file_order_json,
                merge.merge_configuration.total_pages as i64,
                merge.merge_configuration.compression_level.as_ref(),
                merge.status.as_ref(),
                merge.error_message,
                merge.created_at.to_rfc3339(),
                merge.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        for (position, file_id) in merge.source_file_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO merge_sources (merge_id, position, file_id) VALUES (?1, ?2, ?3)",
                params![merge.id, position as i64, file_id],
            )
            .map_err(DatabaseError::Query)?;
        }

        for annotation in &merge.annotations {
            insert_annotation_with(&tx, &merge.id, annotation)?;
        }

        tx.commit().map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a merge operation owned by `user_id`
    pub fn get_merge(&self, id: &str, user_id: &str) -> ServiceResult<Option<MergeOperation>> {
        let conn = self.conn()?;

        let merge = conn
            .query_row(
                &format!(
                    "SELECT {} FROM merge_operations WHERE id = ?1 AND user_id = ?2",
                    MergeOperation::COLUMNS
                ),
                params![id, user_id],
                MergeOperation::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        match merge {
            Some(mut merge) => {
                load_children(&conn, &mut merge)?;
                Ok(Some(merge))
            }
            None => Ok(None),
        }
    }

    /// List a user's most recent merge operations, newest first
    pub fn list_merges(&self, user_id: &str, limit: usize) -> ServiceResult<Vec<MergeOperation>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM merge_operations WHERE user_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                MergeOperation::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let mut merges = stmt
            .query_map(params![user_id, limit as i64], MergeOperation::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        for merge in &mut merges {
            load_children(&conn, merge)?;
        }

        Ok(merges)
    }

    /// Append an annotation to a merge owned by `user_id`.
    ///
    /// Returns `false` if the merge does not exist for that user.
    pub fn add_annotation(
        &self,
        merge_id: &str,
        user_id: &str,
        annotation: &Annotation,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let touched = tx
            .execute(
                "UPDATE merge_operations SET updated_at = ?1 WHERE id = ?2 AND user_id = ?3",
                params![Utc::now().to_rfc3339(), merge_id, user_id],
            )
            .map_err(DatabaseError::Query)?;

        if touched == 0 {
            return Ok(false);
        }

        insert_annotation_with(&tx, merge_id, annotation)?;
        tx.commit().map_err(DatabaseError::Query)?;

        Ok(true)
    }
}

fn insert_annotation_with(
    conn: &Connection,
    merge_id: &str,
    annotation: &Annotation,
) -> ServiceResult<()> {
    conn.execute(
        r#"
        INSERT INTO merge_annotations (id, merge_id, kind, content, x, y, page, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            annotation.id,
            merge_id,
            annotation.kind.as_ref(),
            annotation.content,
            annotation.position.x,
            annotation.position.y,
            annotation.position.page.map(|p| p as i64),
            annotation.created_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}

/// Fill in the ordered source ids and the annotations of a merge
fn load_children(conn: &Connection, merge: &mut MergeOperation) -> ServiceResult<()> {
    let mut stmt = conn
        .prepare("SELECT file_id FROM merge_sources WHERE merge_id = ?1 ORDER BY position")
        .map_err(DatabaseError::Query)?;

    merge.source_file_ids = stmt
        .query_map(params![merge.id], |row| row.get(0))
        .map_err(DatabaseError::Query)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(DatabaseError::Query)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, kind, content, x, y, page, created_at FROM merge_annotations \
             WHERE merge_id = ?1 ORDER BY created_at, rowid",
        )
        .map_err(DatabaseError::Query)?;

    merge.annotations = stmt
        .query_map(params![merge.id], Annotation::from_row)
        .map_err(DatabaseError::Query)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::Query)?;

    Ok(())
}
