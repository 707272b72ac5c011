//! Collection image uploads.
//!
//! The admin panel sends collection images as base64 data URLs inside a JSON
//! body. They are decoded, checked and written under the collection images
//! directory with a sanitized name.

use std::sync::{Arc, LazyLock};

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use showroom_common::{AppError, AppResult, StorageBackend};

use super::media::{ImageFormat, has_image_extension};

#[allow(clippy::unwrap_used)]
static DATA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(\w+);base64,(.+)$").unwrap());

/// Upload request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadInput {
    /// `data:image/<type>;base64,<payload>`.
    #[serde(default)]
    pub image_data: String,
    /// Requested file name; sanitized before use.
    #[serde(default)]
    pub filename: String,
}

/// A stored collection image.
#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Decoded `data:image/...;base64,...` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Subtype as written in the URL (`jpeg`, `jpg`, `png`, ...).
    pub subtype: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Parse and decode a data URL.
    pub fn parse(input: &str) -> AppResult<Self> {
        let caps = DATA_URL_RE
            .captures(input)
            .ok_or_else(|| AppError::BadRequest("Invalid image data format".to_string()))?;
        let subtype = caps[1].to_string();
        let format = ImageFormat::from_subtype(&subtype)
            .ok_or_else(|| AppError::BadRequest("Invalid image type".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&caps[2])
            .map_err(|_| AppError::BadRequest("Invalid base64 data".to_string()))?;

        Ok(Self {
            subtype,
            format,
            bytes,
        })
    }
}

/// Service writing collection images through a storage backend.
#[derive(Clone)]
pub struct CollectionImageService {
    storage: Arc<dyn StorageBackend>,
    images_dir: String,
    max_upload_bytes: usize,
}

impl CollectionImageService {
    /// Create a new service writing below `images_dir` (a storage key prefix).
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        images_dir: impl Into<String>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            storage,
            images_dir: images_dir.into().trim_end_matches('/').to_string(),
            max_upload_bytes,
        }
    }

    /// Validate, decode and store an uploaded image.
    ///
    /// An existing file with the same sanitized name is replaced.
    pub async fn upload(&self, input: ImageUploadInput) -> AppResult<StoredImage> {
        if input.image_data.is_empty() || input.filename.is_empty() {
            return Err(AppError::BadRequest(
                "Missing imageData or filename".to_string(),
            ));
        }

        let data = DataUrl::parse(&input.image_data)?;
        if data.bytes.len() > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "Image too large. Maximum size is {}MB",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }

        let filename = sanitize_filename(&input.filename, &data, chrono::Utc::now().timestamp_millis());
        let key = format!("{}/{filename}", self.images_dir);
        let content_type = format!("image/{}", data.subtype);
        if self.storage.exists(&key).await? {
            tracing::debug!(key = %key, "Replacing existing collection image");
        }
        let stored = self
            .storage
            .upload(&key, &data.bytes, &content_type)
            .await?;

        tracing::info!(filename = %filename, size = stored.size, "Uploaded collection image");

        Ok(StoredImage {
            filename,
            path: stored.url,
            size: stored.size,
            content_type,
        })
    }
}

/// Reduce a requested name to `[A-Za-z0-9_.-]`, without leading dots, and
/// make sure it ends in an accepted image extension.
#[must_use]
pub fn sanitize_filename(requested: &str, data: &DataUrl, now_millis: i64) -> String {
    let cleaned: String = requested
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return format!("collection_{now_millis}.{}", data.subtype);
    }

    match cleaned.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && has_image_extension(cleaned) => cleaned.to_string(),
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{}", data.format.extension()),
        _ => format!("{cleaned}.{}", data.format.extension()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use showroom_common::LocalStorage;

    fn data_url(subtype: &str, bytes: &[u8]) -> String {
        format!(
            "data:image/{subtype};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn service(root: &std::path::Path, max: usize) -> CollectionImageService {
        let storage = Arc::new(LocalStorage::new(root.to_path_buf(), String::new()));
        CollectionImageService::new(storage, "img/collections", max)
    }

    #[test]
    fn test_parse_data_url() {
        let parsed = DataUrl::parse(&data_url("jpeg", b"abc")).unwrap();
        assert_eq!(parsed.subtype, "jpeg");
        assert_eq!(parsed.format, ImageFormat::Jpeg);
        assert_eq!(parsed.bytes, b"abc");
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        for (input, message) in [
            ("not a data url", "Invalid image data format"),
            ("data:text/plain;base64,QQ==", "Invalid image data format"),
            ("data:image/gif;base64,QQ==", "Invalid image type"),
            ("data:image/png;base64,@@@", "Invalid base64 data"),
        ] {
            let err = DataUrl::parse(input).unwrap_err();
            assert_eq!(err.to_string(), message, "input {input:?}");
        }
    }

    #[test]
    fn test_sanitize_filename() {
        let jpeg = DataUrl::parse(&data_url("jpeg", b"x")).unwrap();
        let png = DataUrl::parse(&data_url("png", b"x")).unwrap();

        assert_eq!(sanitize_filename("summer-dress.jpg", &jpeg, 1), "summer-dress.jpg");
        assert_eq!(sanitize_filename("summer dress!.png", &png, 1), "summerdress.png");
        assert_eq!(sanitize_filename("cover", &jpeg, 1), "cover.jpg");
        assert_eq!(sanitize_filename("cover.exe", &png, 1), "cover.png");
        assert_eq!(sanitize_filename("../../etc/passwd", &png, 1), "etcpasswd.png");
        assert_eq!(sanitize_filename("???", &jpeg, 42), "collection_42.jpeg");
    }

    #[tokio::test]
    async fn test_upload_writes_under_images_dir() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 1024);

        let stored = service
            .upload(ImageUploadInput {
                image_data: data_url("png", b"\x89PNG"),
                filename: "hat.png".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(stored.filename, "hat.png");
        assert_eq!(stored.path, "img/collections/hat.png");
        assert_eq!(stored.size, 4);
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(
            std::fs::read(dir.path().join("img/collections/hat.png")).unwrap(),
            b"\x89PNG"
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_image() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 4);

        let err = service
            .upload(ImageUploadInput {
                image_data: data_url("jpeg", b"12345"),
                filename: "big.jpg".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dir.path().join("img/collections/big.jpg").exists());
    }

    #[tokio::test]
    async fn test_upload_requires_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 1024);

        let err = service
            .upload(ImageUploadInput {
                image_data: data_url("jpeg", b"x"),
                filename: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing imageData or filename");
    }
}
