//! Collection catalog persistence.
//!
//! The catalog is a single JSON array rewritten as a whole on every save.
//! Before each rewrite the previous document is copied to a timestamped
//! backup next to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use showroom_common::{AppError, AppResult};

/// One product card in the collections catalog.
///
/// Position in the list is the only identity an item has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    /// `[gender, category]`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Web path of the image, or empty.
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub price: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Staged image awaiting export (local editing only).
    #[serde(
        rename = "imageDataURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_data_url: Option<String>,
    /// Set while `image_data_url` has no committed path (local editing only).
    #[serde(rename = "needsUpload", default, skip_serializing_if = "is_false")]
    pub needs_upload: bool,
    /// Fields this server does not manage, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const fn default_active() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl CollectionItem {
    /// Drops the local-editing fields that never reach the canonical file.
    #[must_use]
    pub fn without_transient(mut self) -> Self {
        self.image_data_url = None;
        self.needs_upload = false;
        self
    }

    /// Gender tag, if present.
    #[must_use]
    pub fn gender(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// Category tag, if present.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.tags.get(1).map(String::as_str)
    }
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    /// Number of items written.
    pub count: usize,
    /// When the save completed.
    pub timestamp: DateTime<Utc>,
    /// Backup of the previous document, if there was one.
    pub backup: Option<PathBuf>,
}

/// File-backed store for the collections catalog.
#[derive(Clone)]
pub struct CollectionStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CollectionStore {
    /// Create a store for the document at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the canonical document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog.
    ///
    /// A missing document is an empty catalog. A document that is not a JSON
    /// array of items is also reported as empty and left on disk untouched
    /// until the next save replaces it.
    pub async fn load(&self) -> AppResult<Vec<CollectionItem>> {
        let _guard = self.lock.lock().await;

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::io("Error loading collections", &e)),
        };

        match serde_json::from_slice::<Vec<CollectionItem>>(&bytes) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Collections document is malformed, serving an empty list"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replace the catalog.
    ///
    /// Transient editing fields are stripped. The new document is written to
    /// a sibling temp file and renamed over the canonical one.
    pub async fn save(&self, items: Vec<CollectionItem>) -> AppResult<SaveReceipt> {
        let items: Vec<CollectionItem> = items
            .into_iter()
            .map(CollectionItem::without_transient)
            .collect();
        let body = serde_json::to_vec_pretty(&items)?;

        let _guard = self.lock.lock().await;
        let now = Utc::now();

        let backup = if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| AppError::io("Error saving collections", &e))?
        {
            let backup = self
                .back_up(now)
                .await
                .map_err(|e| AppError::io("Failed to back up collections", &e))?;
            Some(backup)
        } else {
            None
        };

        write_replacing(&self.path, &body)
            .await
            .map_err(|e| AppError::io("Error saving collections", &e))?;

        tracing::info!(
            count = items.len(),
            backup = ?backup,
            "Saved collections"
        );

        Ok(SaveReceipt {
            count: items.len(),
            timestamp: now,
            backup,
        })
    }

    /// Copy the current document to a new backup file. Backups are never
    /// overwritten: a name already taken gets a `-1`, `-2`, ... suffix.
    async fn back_up(&self, at: DateTime<Utc>) -> std::io::Result<PathBuf> {
        let current = tokio::fs::read(&self.path).await?;
        let name = self
            .path
            .file_name()
            .map_or_else(|| "collections.json".into(), |n| n.to_string_lossy());
        let base = format!("{name}.backup.{}", backup_stamp(at));

        let mut attempt = 0u32;
        loop {
            let candidate = if attempt == 0 {
                self.path.with_file_name(&base)
            } else {
                self.path.with_file_name(format!("{base}-{attempt}"))
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&current).await?;
                    file.flush().await?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

/// ISO-8601 UTC timestamp with `:` and `.` replaced by `-`.
#[must_use]
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// Write `data` to a temp file beside `path`, then rename it into place.
pub(crate) async fn write_replacing(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map_or_else(|| "document".into(), |n| n.to_string_lossy());
    let tmp = path.with_file_name(format!(".{name}.tmp"));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn item(title: &str) -> CollectionItem {
        serde_json::from_value(json!({
            "tags": ["Female", "Dresses"],
            "img": format!("img/collections/{title}.jpg"),
            "alt": title,
            "title": title,
            "desc": "Silk",
            "price": "$120",
        }))
        .unwrap()
    }

    fn backups(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("collections.json.backup."))
            .collect()
    }

    #[test]
    fn test_active_defaults_to_true() {
        let item = item("gown");
        assert!(item.active);
        assert_eq!(item.gender(), Some("Female"));
        assert_eq!(item.category(), Some("Dresses"));
    }

    #[test]
    fn test_backup_stamp_format() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 16, 8, 55, 1)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(123))
            .unwrap();
        assert_eq!(backup_stamp(at), "2026-10-16T08-55-01-123Z");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips_without_transient_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));

        let mut staged = item("coat");
        staged.image_data_url = Some("data:image/png;base64,AAAA".to_string());
        staged.needs_upload = true;
        staged
            .extra
            .insert("featured".to_string(), json!(true));
        let mut inactive = item("scarf");
        inactive.active = false;

        let receipt = store
            .save(vec![staged.clone(), inactive.clone()])
            .await
            .unwrap();
        assert_eq!(receipt.count, 2);
        assert!(receipt.backup.is_none());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![staged.without_transient(), inactive]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("imageDataURL"));
        assert!(!raw.contains("needsUpload"));
        assert!(raw.contains("\"featured\": true"));
    }

    #[tokio::test]
    async fn test_save_backs_up_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));

        store.save(vec![item("first")]).await.unwrap();
        assert!(backups(dir.path()).is_empty());

        let receipt = store.save(vec![item("second")]).await.unwrap();
        let backup = receipt.backup.unwrap();
        let previous: Vec<CollectionItem> =
            serde_json::from_slice(&std::fs::read(&backup).unwrap()).unwrap();
        assert_eq!(previous[0].title, "first");
        assert_eq!(backups(dir.path()).len(), 1);
        assert_eq!(store.load().await.unwrap()[0].title, "second");
    }

    #[tokio::test]
    async fn test_malformed_document_loads_empty_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collections.json");
        std::fs::write(&path, "[{\"title\": ").unwrap();
        let store = CollectionStore::new(path.clone());

        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"title\": ");

        store.save(vec![item("fresh")]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
        // The malformed document is what got backed up.
        let backup = dir.path().join(&backups(dir.path())[0]);
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "[{\"title\": ");
    }

    #[tokio::test]
    async fn test_non_array_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collections.json");
        std::fs::write(&path, "{\"items\": []}").unwrap();
        let store = CollectionStore::new(path);

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.save(vec![item(&format!("item{i}"))]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].title.starts_with("item"));
    }

    #[tokio::test]
    async fn test_every_save_keeps_its_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));

        for i in 0..6 {
            store.save(vec![item(&format!("v{i}"))]).await.unwrap();
        }
        assert_eq!(backups(dir.path()).len(), 5);
    }

    #[tokio::test]
    async fn test_backup_name_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path().join("collections.json"));
        store.save(vec![item("only")]).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let first = store.back_up(at).await.unwrap();
        let second = store.back_up(at).await.unwrap();
        let third = store.back_up(at).await.unwrap();

        let name = |p: &Path| p.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name(&first), "collections.json.backup.2026-10-16T09-00-00-000Z");
        assert_eq!(name(&second), "collections.json.backup.2026-10-16T09-00-00-000Z-1");
        assert_eq!(name(&third), "collections.json.backup.2026-10-16T09-00-00-000Z-2");
        assert_eq!(
            std::fs::read(&third).unwrap(),
            std::fs::read(store.path()).unwrap()
        );
    }
}
