//! Gallery manifest.
//!
//! The manifest is a small JSON document with the number of images in each
//! gallery category, read by the public site. It is a cache of the gallery
//! directories and is recomputed from them after every gallery change.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use showroom_common::{AppError, AppResult};

use super::category::Category;
use super::collection::write_replacing;
use super::gallery::GalleryLayout;

/// Per-category image counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryManifest {
    #[serde(rename = "Male")]
    pub male: u64,
    #[serde(rename = "Female")]
    pub female: u64,
}

impl GalleryManifest {
    /// Count for one category.
    #[must_use]
    pub const fn get(&self, category: Category) -> u64 {
        match category {
            Category::Male => self.male,
            Category::Female => self.female,
        }
    }

    /// Set the count for one category.
    pub fn set(&mut self, category: Category, count: u64) {
        match category {
            Category::Male => self.male = count,
            Category::Female => self.female = count,
        }
    }

    /// Lenient conversion: anything that is not a non-negative integer
    /// counts as 0.
    fn from_lenient(value: &serde_json::Value) -> Self {
        let mut manifest = Self::default();
        for category in Category::ALL {
            let count = value
                .get(category.as_str())
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            manifest.set(category, count);
        }
        manifest
    }

    /// Strict conversion used for client-supplied manifests.
    fn from_strict(value: &serde_json::Value) -> AppResult<Self> {
        let mut manifest = Self::default();
        for category in Category::ALL {
            let count = value
                .get(category.as_str())
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| {
                    AppError::Validation(
                        "Invalid manifest structure. Must contain Male and Female counts"
                            .to_string(),
                    )
                })?;
            manifest.set(category, count);
        }
        Ok(manifest)
    }
}

/// Reads, writes and recomputes the persisted manifest.
#[derive(Clone)]
pub struct ManifestTracker {
    path: PathBuf,
    layout: GalleryLayout,
    lock: Arc<Mutex<()>>,
}

impl ManifestTracker {
    /// Create a tracker for the manifest at `path`, counting images in
    /// `layout`.
    #[must_use]
    pub fn new(path: PathBuf, layout: GalleryLayout) -> Self {
        Self {
            path,
            layout,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Count managed images per category. Touches nothing.
    pub async fn recompute(&self) -> AppResult<GalleryManifest> {
        let mut manifest = GalleryManifest::default();
        for category in Category::ALL {
            let count = self.layout.scan(category).await?.len();
            manifest.set(category, count as u64);
        }
        Ok(manifest)
    }

    /// Recompute and persist.
    ///
    /// The scan and the write happen under one lock, so the last refresh to
    /// finish always reflects the directories as they were when it started.
    pub async fn refresh(&self) -> AppResult<GalleryManifest> {
        let _guard = self.lock.lock().await;
        let manifest = self.recompute().await?;
        self.persist_locked(&manifest).await?;
        tracing::debug!(male = manifest.male, female = manifest.female, "Manifest refreshed");
        Ok(manifest)
    }

    /// Persisted manifest, or zeros if it is missing or unreadable.
    pub async fn read(&self) -> GalleryManifest {
        let _guard = self.lock.lock().await;

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return GalleryManifest::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read manifest");
                return GalleryManifest::default();
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => GalleryManifest::from_lenient(&value),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Manifest is malformed");
                GalleryManifest::default()
            }
        }
    }

    /// Replace the persisted manifest with a client-supplied one.
    pub async fn write(&self, value: &serde_json::Value) -> AppResult<GalleryManifest> {
        let manifest = GalleryManifest::from_strict(value)?;
        let _guard = self.lock.lock().await;
        self.persist_locked(&manifest).await?;
        tracing::info!(male = manifest.male, female = manifest.female, "Manifest updated");
        Ok(manifest)
    }

    /// Caller holds `self.lock`.
    async fn persist_locked(&self, manifest: &GalleryManifest) -> AppResult<()> {
        let body = serde_json::to_vec_pretty(manifest)?;
        write_replacing(&self.path, &body)
            .await
            .map_err(|e| AppError::io("Failed to write manifest", &e))
    }
}
