//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called during database initialization to bring the schema up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Accounts
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            profile_image TEXT,
            account_status TEXT NOT NULL DEFAULT 'active'
                CHECK (account_status IN ('active', 'suspended', 'deleted')),
            subscription TEXT NOT NULL DEFAULT 'free'
                CHECK (subscription IN ('free', 'premium', 'enterprise')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Stored PDF binaries
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            original_file_name TEXT NOT NULL,
            stored_file_name TEXT NOT NULL UNIQUE,
            file_url TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            mime_type TEXT NOT NULL DEFAULT 'application/pdf',
            checksum TEXT NOT NULL,
            upload_timestamp TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'deleted', 'archived')),
            page_count INTEGER NOT NULL DEFAULT 0,
            width REAL,
            height REAL,
            pdf_version TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_files_user_status ON files(user_id, status);
        CREATE INDEX IF NOT EXISTS idx_files_upload ON files(upload_timestamp);

        -- Merge history
        CREATE TABLE IF NOT EXISTS merge_operations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            operation_name TEXT NOT NULL,
            merged_file_id TEXT NOT NULL,
            file_order TEXT NOT NULL DEFAULT '[]',
            total_pages INTEGER NOT NULL DEFAULT 0,
            compression_level TEXT NOT NULL DEFAULT 'none',
            status TEXT NOT NULL DEFAULT 'processing'
                CHECK (status IN ('processing', 'completed', 'failed')),
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (merged_file_id) REFERENCES files(id)
        );

        CREATE INDEX IF NOT EXISTS idx_merges_user_created ON merge_operations(user_id, created_at);

        -- Ordered sources of a merge
        CREATE TABLE IF NOT EXISTS merge_sources (
            merge_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            file_id TEXT NOT NULL,
            PRIMARY KEY (merge_id, position),
            FOREIGN KEY (merge_id) REFERENCES merge_operations(id) ON DELETE CASCADE,
            FOREIGN KEY (file_id) REFERENCES files(id)
        );

        CREATE TABLE IF NOT EXISTS merge_annotations (
            id TEXT PRIMARY KEY,
            merge_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('text', 'highlight', 'stamp', 'image')),
            content TEXT,
            x REAL,
            y REAL,
            page INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (merge_id) REFERENCES merge_operations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_merge_annotations_merge ON merge_annotations(merge_id);
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    run_last_login_migration(conn)?;

    Ok(())
}

/// Add the `last_login` column to databases created before logins were tracked.
///
/// SQLite has no ADD COLUMN IF NOT EXISTS, so check the table info first.
fn run_last_login_migration(conn: &Connection) -> ServiceResult<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name='last_login'",
            [],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )
        .map_err(DatabaseError::Query)?;

    if !has_column {
        conn.execute("ALTER TABLE users ADD COLUMN last_login TEXT", [])
            .map_err(|e| DatabaseError::Migration {
                message: format!("Failed to add last_login column: {}", e),
            })?;
    }

    Ok(())
}
