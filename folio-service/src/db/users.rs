//! User account operations.

use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension, params};

use super::Database;
use super::models::User;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a new user.
    ///
    /// Returns `false` without inserting when the email is already registered.
    pub fn insert_user(&self, user: &User) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let result = conn.execute(
            r#"
            INSERT INTO users (id, full_name, email, password_hash, profile_image, account_status, subscription, created_at, updated_at, last_login)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                user.id,
                user.full_name,
                user.email,
                user.password_hash,
                user.profile_image,
                user.account_status.as_ref(),
                user.subscription.as_ref(),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
                user.last_login.map(|t| t.to_rfc3339()),
            ],
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(e) => Err(DatabaseError::Query(e).into()),
        }
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> ServiceResult<Option<User>> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
                params![id],
                User::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(user)
    }

    /// Get a user by email. Emails are stored lowercased.
    pub fn get_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
                params![email.to_lowercase()],
                User::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        Ok(user)
    }

    /// Record a successful login
    pub fn record_login(&self, id: &str, at: DateTime<Utc>) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Change an account's lifecycle state
    #[cfg(test)]
    pub fn set_account_status(
        &self,
        id: &str,
        status: super::models::AccountStatus,
    ) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let updated = conn
            .execute(
                "UPDATE users SET account_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_ref(), Utc::now().to_rfc3339(), id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated > 0)
    }
}
