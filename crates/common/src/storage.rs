//! File storage abstraction for site assets.
//!
//! Keys are forward-slash paths relative to the storage root, which are also
//! the web paths the static site uses to reference the files.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, AppResult};

/// Stored file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (path relative to the storage root).
    pub key: String,
    /// Web path used to reference the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a file, replacing any existing file with the same key.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// An empty `base_url` yields root-relative web paths such as
    /// `img/collections/a.jpg`.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Resolves a key below the base path, rejecting traversal.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        let path = self.resolve(key)?;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::io("Failed to create directory", &e))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::io("Failed to write file", &e))?;

        tracing::debug!(key = %key, size = data.len(), "Stored file");

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            key.to_string()
        } else {
            format!("{base}/{key}")
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::io("Failed to stat file", &e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), String::new());

        let file = storage
            .upload("img/collections/coat.jpg", b"jpeg", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(file.url, "img/collections/coat.jpg");
        assert_eq!(file.size, 4);
        assert!(storage.exists("img/collections/coat.jpg").await.unwrap());
        assert_eq!(
            std::fs::read(dir.path().join("img/collections/coat.jpg")).unwrap(),
            b"jpeg"
        );
    }

    #[tokio::test]
    async fn test_traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), String::new());

        for key in ["../escape.jpg", "/etc/passwd", "img/../../x.png", ""] {
            let err = storage.upload(key, b"x", "image/png").await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn test_public_url_with_base() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "/files/".to_string());

        assert_eq!(storage.public_url("a/b.png"), "/files/a/b.png");
        assert!(!storage.exists("a/b.png").await.unwrap());
    }
}
