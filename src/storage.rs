use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{AppError, Result};

// 1. StorageService Contract
/// StorageService
///
/// Defines the contract for persisting uploaded media. Handlers only ever see this trait,
/// so the filesystem implementation (`LocalStorage`) can be swapped for the in-memory
/// `MockStorageService` in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the upload directory if it does not exist yet. Safe to call at startup.
    async fn ensure_dir(&self) -> Result<()>;

    /// Writes `bytes` under the already-generated storage name `name`.
    ///
    /// Failures surface as `AppError::Internal`; the message is logged, never returned
    /// to the client, so it may carry paths.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

// 2. The Real Implementation (local filesystem)
/// LocalStorage
///
/// Writes uploads into a single flat directory. The hosting layer serves that same
/// directory under the public upload path.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    upload_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| {
                tracing::error!(dir = %self.upload_dir.display(), error = %e, "cannot create upload dir");
                AppError::Internal(format!(
                    "create {} failed: {e}",
                    self.upload_dir.display()
                ))
            })
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        // Directory may have been removed since startup.
        self.ensure_dir().await?;

        let path = self.upload_dir.join(sanitize_name(name));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "upload write failed");
            AppError::Internal(format!("write {} failed: {e}", path.display()))
        })
    }
}

/// sanitize_name
///
/// Keeps only the final path component so a name can never escape the upload directory.
fn sanitize_name(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .unwrap_or("upload")
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// Keeps written files in memory so handler tests can assert on what was stored
/// without touching the filesystem.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Size in bytes of a stored file, if it was saved.
    pub fn stored_len(&self, name: &str) -> Option<usize> {
        self.files.lock().ok()?.get(name).copied()
    }

    pub fn stored_count(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_dir(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.should_fail {
            return Err(AppError::Internal(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        self.files
            .lock()
            .map_err(|_| AppError::Internal("mock storage lock poisoned".into()))?
            .insert(sanitize_name(name).to_string(), bytes.len());
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_name("a.png"), "a.png");
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("dir\\file.jpg"), "file.jpg");
        assert_eq!(sanitize_name(".."), "upload");
    }

    #[tokio::test]
    async fn mock_records_saved_files() {
        let storage = MockStorageService::new();
        storage.save("x.png", &[1, 2, 3]).await.unwrap();
        assert_eq!(storage.stored_len("x.png"), Some(3));
        assert_eq!(storage.stored_count(), 1);
    }

    #[tokio::test]
    async fn failing_mock_reports_internal_error() {
        let storage = MockStorageService::new_failing();
        let err = storage.save("x.png", b"data").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
