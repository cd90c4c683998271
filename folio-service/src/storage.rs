//! On-disk storage for PDF binaries.
//!
//! Every binary lives flat inside the upload directory under a generated,
//! collision-free name. That name is the only link between a file record
//! and its bytes.

mod hash;

pub use hash::compute_checksum;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;

/// Public URL prefix the upload directory is served under
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Where a stored binary came from; decides its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredKind {
    Upload,
    Edited,
    Merged,
}

impl StoredKind {
    fn prefix(self) -> &'static str {
        match self {
            StoredKind::Upload => "upload",
            StoredKind::Edited => "edited",
            StoredKind::Merged => "merged",
        }
    }
}

/// Flat directory of stored PDF binaries
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if needed
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))
    }

    /// Generate a fresh stored name such as `merged-<uuid>.pdf`
    pub fn new_stored_name(kind: StoredKind) -> String {
        format!("{}-{}.pdf", kind.prefix(), Uuid::new_v4())
    }

    /// Public URL of a stored binary
    pub fn url_for(stored_name: &str) -> String {
        format!("{}/{}", UPLOADS_ROUTE, stored_name)
    }

    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    pub async fn write(&self, stored_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(stored_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))
    }

    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(stored_name);
        tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))
    }

    pub async fn exists(&self, stored_name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(stored_name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))
    }

    /// Remove a stored binary. A binary that is already gone is not an error.
    pub async fn remove(&self, stored_name: &str) -> Result<(), StorageError> {
        let path = self.path_for(stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    /// Remove a binary during cleanup, logging instead of failing
    pub async fn discard(&self, stored_name: &str) {
        if let Err(e) = self.remove(stored_name).await {
            tracing::warn!(
                stored_file_name = %stored_name,
                error = %crate::error::format_error_chain(&e),
                "Failed to remove stored binary"
            );
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stored_names_are_unique_and_prefixed() {
        let first = FileStore::new_stored_name(StoredKind::Edited);
        let second = FileStore::new_stored_name(StoredKind::Edited);

        assert!(first.starts_with("edited-"));
        assert!(first.ends_with(".pdf"));
        assert_ne!(first, second);
        assert!(FileStore::new_stored_name(StoredKind::Merged).starts_with("merged-"));
        assert_eq!(FileStore::url_for("a.pdf"), "/uploads/a.pdf");
    }

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("uploads"));
        store.ensure_root().await.unwrap();

        store.write("x.pdf", b"%PDF-1.7").await.unwrap();
        assert!(store.exists("x.pdf").await.unwrap());
        assert_eq!(store.read("x.pdf").await.unwrap(), b"%PDF-1.7");

        store.remove("x.pdf").await.unwrap();
        assert!(!store.exists("x.pdf").await.unwrap());
        // Removing twice is fine
        store.remove("x.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_reports_path() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let err = store.read("nope.pdf").await.unwrap_err();
        assert!(err.to_string().contains("nope.pdf"));
    }
}
