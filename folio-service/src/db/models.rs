//! Database model structs.
//!
//! This module contains the data structures for database records. They
//! serialize in camelCase because they are also the API payloads.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Account lifecycle state; only `active` accounts can log in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Subscription {
    #[default]
    Free,
    Premium,
    Enterprise,
}

/// Stored file state. Deleted files stay in the table so merge history can
/// still reference them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Active,
    Deleted,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MergeStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

/// Stream compression applied to a merged document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompressionLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnnotationKind {
    Text,
    Highlight,
    Stamp,
    Image,
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub profile_image: Option<String>,
    pub account_status: AccountStatus,
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub(crate) const COLUMNS: &'static str = "id, full_name, email, password_hash, profile_image, \
         account_status, subscription, created_at, updated_at, last_login";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            profile_image: row.get(4)?,
            account_status: parse_enum(row, 5)?,
            subscription: parse_enum(row, 6)?,
            created_at: parse_timestamp(row, 7)?,
            updated_at: parse_timestamp(row, 8)?,
            last_login: parse_optional_timestamp(row, 9)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active
    }
}

/// The fields of a user that are safe to hand back to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub subscription: Subscription,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            profile_image: user.profile_image.clone(),
            subscription: user.subscription,
            account_status: user.account_status,
            created_at: user.created_at,
        }
    }
}

/// Page metadata captured when a PDF is stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub page_count: u32,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub version: Option<String>,
}

/// Stored PDF record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub user_id: String,
    pub original_file_name: String,
    /// Unique name of the binary inside the upload directory
    pub stored_file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Hex SHA-256 of the stored bytes
    pub checksum: String,
    pub upload_timestamp: DateTime<Utc>,
    pub status: FileStatus,
    pub metadata: FileMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub(crate) const COLUMNS: &'static str = "id, user_id, original_file_name, stored_file_name, \
         file_url, file_size, mime_type, checksum, upload_timestamp, status, page_count, width, \
         height, pdf_version, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let file_size: i64 = row.get(5)?;
        let page_count: i64 = row.get(10)?;

        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            original_file_name: row.get(2)?,
            stored_file_name: row.get(3)?,
            file_url: row.get(4)?,
            file_size: file_size.max(0) as u64,
            mime_type: row.get(6)?,
            checksum: row.get(7)?,
            upload_timestamp: parse_timestamp(row, 8)?,
            status: parse_enum(row, 9)?,
            metadata: FileMetadata {
                page_count: page_count.max(0) as u32,
                width: row.get(11)?,
                height: row.get(12)?,
                version: row.get(13)?,
            },
            created_at: parse_timestamp(row, 14)?,
            updated_at: parse_timestamp(row, 15)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == FileStatus::Active
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConfiguration {
    /// Display names of the source files in merge order
    pub file_order: Vec<String>,
    pub total_pages: u32,
    #[serde(default)]
    pub compression_level: CompressionLevel,
}

/// Where an annotation sits; the client may omit any coordinate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub content: Option<String>,
    pub position: AnnotationPosition,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let page: Option<i64> = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            kind: parse_enum(row, 1)?,
            content: row.get(2)?,
            position: AnnotationPosition {
                x: row.get(3)?,
                y: row.get(4)?,
                page: page.map(|p| p.max(0) as u32),
            },
            created_at: parse_timestamp(row, 6)?,
        })
    }
}

/// Persisted record of one completed merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperation {
    pub id: String,
    pub user_id: String,
    pub operation_name: String,
    pub source_file_ids: Vec<String>,
    pub merged_file_id: String,
    pub merge_configuration: MergeConfiguration,
    pub annotations: Vec<Annotation>,
    pub status: MergeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MergeOperation {
    pub(crate) const COLUMNS: &'static str = "id, user_id, operation_name, merged_file_id, \
         file_order, total_pages, compression_level, status, error_message, created_at, updated_at";

    /// Build from a `merge_operations` row; sources and annotations are
    /// loaded separately.
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let file_order_json: String = row.get(4)?;
        let file_order: Vec<String> = serde_json::from_str(&file_order_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
        let total_pages: i64 = row.get(5)?;

        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            operation_name: row.get(2)?,
            source_file_ids: Vec::new(),
            merged_file_id: row.get(3)?,
            merge_configuration: MergeConfiguration {
                file_order,
                total_pages: total_pages.max(0) as u32,
                compression_level: parse_enum(row, 6)?,
            },
            annotations: Vec::new(),
            status: parse_enum(row, 7)?,
            error_message: row.get(8)?,
            created_at: parse_timestamp(row, 9)?,
            updated_at: parse_timestamp(row, 10)?,
        })
    }
}

fn parse_enum<T>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(
    row: &Row<'_>,
    idx: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
                })
        })
        .transpose()
}
