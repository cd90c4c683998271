//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct and all database operations
//! organized into submodules by domain.

mod files;
mod merges;
mod migrations;
pub mod models;
mod users;

pub use models::{
    AccountStatus, Annotation, AnnotationKind, AnnotationPosition, CompressionLevel,
    FileMetadata, FileRecord, FileStatus, MergeConfiguration, MergeOperation, MergeStatus,
    Subscription, User, UserProfile,
};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Database(DatabaseError::Connection(
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e)),
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // WAL for concurrent readers while a request writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use super::models::{AccountStatus, FileMetadata, FileRecord, FileStatus, Subscription, User};

    pub fn sample_user(id: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            full_name: "Grace Hopper".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            profile_image: None,
            account_status: AccountStatus::Active,
            subscription: Subscription::Free,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn sample_file(id: &str, user_id: &str, name: &str) -> FileRecord {
        let now = Utc::now();
        let stored = format!("{}.pdf", id);
        FileRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            original_file_name: name.to_string(),
            file_url: format!("/uploads/{}", stored),
            stored_file_name: stored,
            file_size: 1024,
            mime_type: "application/pdf".to_string(),
            checksum: "00".repeat(32),
            upload_timestamp: now,
            status: FileStatus::Active,
            metadata: FileMetadata {
                page_count: 2,
                width: Some(612.0),
                height: Some(792.0),
                version: Some("1.7".to_string()),
            },
            created_at: now,
            updated_at: now,
        }
    }
}
