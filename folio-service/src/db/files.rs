//! Stored file operations.
//!
//! Files are never removed from the table. Deleting a file flips its status
//! so merge history keeps resolving the ids it references.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::Database;
use super::models::{FileRecord, FileStatus};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a new file record
    pub fn insert_file(&self, file: &FileRecord) -> ServiceResult<()> {
        let conn = self.conn()?;
        insert_file_with(&conn, file)
    }

    /// Get a file owned by `user_id`, whatever its status
    pub fn get_owned_file(&self, id: &str, user_id: &str) -> ServiceResult<Option<FileRecord>> {
        let conn = self.conn()?;

        let file = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE id = ?1 AND user_id = ?2",
                    FileRecord::COLUMNS
                ),
                params![id, user_id],
                FileRecord::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(file)
    }

    /// Get an active file owned by `user_id`
    pub fn get_active_file(&self, id: &str, user_id: &str) -> ServiceResult<Option<FileRecord>> {
        Ok(self
            .get_owned_file(id, user_id)?
            .filter(FileRecord::is_active))
    }

    /// List a user's active files, newest upload first
    pub fn list_active_files(&self, user_id: &str) -> ServiceResult<Vec<FileRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files WHERE user_id = ?1 AND status = ?2 \
                 ORDER BY upload_timestamp DESC, rowid DESC",
                FileRecord::COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let files = stmt
            .query_map(
                params![user_id, FileStatus::Active.as_ref()],
                FileRecord::from_row,
            )
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(files)
    }

    /// Load file records by id regardless of owner or status.
    ///
    /// Ids that do not exist are absent from the result; duplicates are
    /// returned once.
    pub fn get_files_by_ids(&self, ids: &[String]) -> ServiceResult<Vec<FileRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files WHERE id IN ({})",
                FileRecord::COLUMNS,
                placeholders
            ))
            .map_err(DatabaseError::Query)?;

        let files = stmt
            .query_map(params_from_iter(ids.iter()), FileRecord::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(files)
    }

    /// Rename a file owned by `user_id`. Returns `false` if no such file.
    pub fn rename_file(&self, id: &str, user_id: &str, name: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let updated = conn
            .execute(
                "UPDATE files SET original_file_name = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND user_id = ?4",
                params![name, Utc::now().to_rfc3339(), id, user_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated > 0)
    }

    /// Set the status of a file owned by `user_id`. Returns `false` if no such file.
    pub fn set_file_status(
        &self,
        id: &str,
        user_id: &str,
        status: FileStatus,
    ) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let updated = conn
            .execute(
                "UPDATE files SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![status.as_ref(), Utc::now().to_rfc3339(), id, user_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated > 0)
    }
}

/// Insert on an existing connection or transaction
pub(super) fn insert_file_with(conn: &Connection, file: &FileRecord) -> ServiceResult<()> {
    conn.execute(
        r#"
        INSERT INTO files (id, user_id, original_file_name, stored_file_name, file_url, file_size, mime_type, checksum, upload_timestamp, status, page_count, width, height, pdf_version, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
        params![
            file.id,
            file.user_id,
            file.original_file_name,
            file.stored_file_name,
            file.file_url,
            file.file_size as i64,
            file.mime_type,
            file.checksum,
            file.upload_timestamp.to_rfc3339(),
            file.status.as_ref(),
            file.metadata.page_count as i64,
            file.metadata.width,
            file.metadata.height,
            file.metadata.version,
            file.created_at.to_rfc3339(),
            file.updated_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{sample_file, sample_user};
    use chrono::Duration;

    fn db_with_user() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&sample_user("u1", "one@example.com")).unwrap();
        db.insert_user(&sample_user("u2", "two@example.com")).unwrap();
        db
    }

    #[test]
    fn test_ownership_is_enforced() {
        let db = db_with_user();
        db.insert_file(&sample_file("f1", "u1", "a.pdf")).unwrap();

        assert!(db.get_owned_file("f1", "u1").unwrap().is_some());
        assert!(db.get_owned_file("f1", "u2").unwrap().is_none());
        assert!(!db.rename_file("f1", "u2", "stolen.pdf").unwrap());
    }

    #[test]
    fn test_list_is_newest_first_and_skips_deleted() {
        let db = db_with_user();

        let mut older = sample_file("f1", "u1", "old.pdf");
        older.upload_timestamp = Utc::now() - Duration::hours(1);
        db.insert_file(&older).unwrap();
        db.insert_file(&sample_file("f2", "u1", "new.pdf")).unwrap();
        db.insert_file(&sample_file("f3", "u1", "gone.pdf")).unwrap();
        db.insert_file(&sample_file("f4", "u2", "other.pdf")).unwrap();

        assert!(db.set_file_status("f3", "u1", FileStatus::Deleted).unwrap());

        let ids: Vec<String> = db
            .list_active_files("u1")
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["f2", "f1"]);

        // Deleted files remain addressable by their owner
        let deleted = db.get_owned_file("f3", "u1").unwrap().unwrap();
        assert_eq!(deleted.status, FileStatus::Deleted);
        assert!(db.get_active_file("f3", "u1").unwrap().is_none());
    }

    #[test]
    fn test_metadata_round_trips_through_columns() {
        let db = db_with_user();
        db.insert_file(&sample_file("f1", "u1", "a.pdf")).unwrap();

        let file = db.get_owned_file("f1", "u1").unwrap().unwrap();
        assert_eq!(file.metadata.page_count, 2);
        assert_eq!(file.metadata.width, Some(612.0));
        assert_eq!(file.metadata.version.as_deref(), Some("1.7"));
        assert_eq!(file.file_url, "/uploads/f1.pdf");
    }

    #[test]
    fn test_get_files_by_ids_ignores_unknown_and_duplicates() {
        let db = db_with_user();
        db.insert_file(&sample_file("f1", "u1", "a.pdf")).unwrap();
        db.insert_file(&sample_file("f2", "u2", "b.pdf")).unwrap();

        let ids = vec!["f1".to_string(), "f1".to_string(), "f2".to_string(), "nope".to_string()];
        let files = db.get_files_by_ids(&ids).unwrap();
        assert_eq!(files.len(), 2);
        assert!(db.get_files_by_ids(&[]).unwrap().is_empty());
    }
}
