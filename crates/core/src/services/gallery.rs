//! Gallery sequencer.
//!
//! Gallery images live in one directory per [`Category`] and are named by
//! their sequence number (`1.jpg`, `2.png`, ...). Uploads take the next free
//! number; deletions are followed by a renumber pass so the remaining files
//! are numbered `1..=n` again, in their previous order.
//!
//! Files whose stem is not a number, or whose extension is not a recognized
//! image type, are not managed: they are never listed, counted or renamed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use showroom_common::{AppError, AppResult};

use super::category::Category;
use super::manifest::{GalleryManifest, ManifestTracker};
use super::media::ImageFormat;

/// Where the gallery lives on disk and how it is addressed on the web.
#[derive(Debug, Clone)]
pub struct GalleryLayout {
    root: PathBuf,
    web_prefix: String,
}

impl GalleryLayout {
    /// `root` is the gallery directory on disk; `web_prefix` is the same
    /// directory as referenced by the site (e.g. `img/gallery`).
    pub fn new(root: PathBuf, web_prefix: impl Into<String>) -> Self {
        let web_prefix = web_prefix.into().replace('\\', "/");
        Self {
            root,
            web_prefix: web_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Directory holding one category.
    #[must_use]
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    fn web_path(&self, category: Category, filename: &str) -> String {
        if self.web_prefix.is_empty() {
            format!("{category}/{filename}")
        } else {
            format!("{}/{category}/{filename}", self.web_prefix)
        }
    }

    /// Scan one category directory for managed images, ordered by
    /// `(sequence, filename)`. A missing directory is an empty category.
    pub async fn scan(&self, category: Category) -> AppResult<Vec<GalleryImage>> {
        let dir = self.category_dir(category);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::io(format!("Error reading {category}"), &e)),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::io(format!("Error reading {category}"), &e))?
        {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            let Some(sequence) = managed_sequence(&filename) else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "Skipping unreadable gallery file");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_millis() as i64);

            images.push(GalleryImage {
                path: self.web_path(category, &filename),
                filename,
                category,
                size: metadata.len(),
                sequence,
                modified,
            });
        }

        images.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(images)
    }
}

/// Sequence number of a managed gallery file name, e.g. `12.webp` → 12.
#[must_use]
pub fn managed_sequence(filename: &str) -> Option<u64> {
    let (stem, ext) = filename.rsplit_once('.')?;
    ImageFormat::from_extension(ext)?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// A managed gallery image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    pub filename: String,
    /// Web path relative to the document root.
    pub path: String,
    pub category: Category,
    pub size: u64,
    pub sequence: u64,
    /// Milliseconds since the Unix epoch.
    pub modified: i64,
}

/// Reference to an image in a delete request. Both fields are raw strings so
/// a single bad entry does not reject a whole bulk request.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub filename: String,
}

/// Result of a single delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// `Category/filename` of the removed file.
    pub deleted: String,
    pub manifest: GalleryManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of a bulk delete. Failures are reported per item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    /// `Category/filename` of every removed file.
    pub deleted: Vec<String>,
    pub deleted_count: usize,
    pub errors: Vec<String>,
    pub manifest: GalleryManifest,
    pub renumbered_categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of an upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub image: GalleryImage,
    pub manifest: GalleryManifest,
    pub warning: Option<String>,
}

struct CategoryLocks {
    male: Mutex<()>,
    female: Mutex<()>,
}

impl CategoryLocks {
    const fn get(&self, category: Category) -> &Mutex<()> {
        match category {
            Category::Male => &self.male,
            Category::Female => &self.female,
        }
    }
}

/// Gallery upload/delete/list service.
#[derive(Clone)]
pub struct GallerySequencer {
    layout: GalleryLayout,
    manifest: ManifestTracker,
    max_upload_bytes: usize,
    locks: Arc<CategoryLocks>,
}

impl GallerySequencer {
    /// Create a new sequencer.
    pub fn new(layout: GalleryLayout, manifest: ManifestTracker, max_upload_bytes: usize) -> Self {
        Self {
            layout,
            manifest,
            max_upload_bytes,
            locks: Arc::new(CategoryLocks {
                male: Mutex::new(()),
                female: Mutex::new(()),
            }),
        }
    }

    /// The manifest tracker kept in sync by this sequencer.
    #[must_use]
    pub const fn manifest(&self) -> &ManifestTracker {
        &self.manifest
    }

    /// List managed images, optionally for one category, ordered by
    /// category name then sequence.
    pub async fn list(&self, category: Option<Category>) -> AppResult<Vec<GalleryImage>> {
        let categories = category.map_or_else(|| Category::ALL.to_vec(), |c| vec![c]);

        let mut images = Vec::new();
        for category in categories {
            images.extend(self.layout.scan(category).await?);
        }
        images.sort_by(|a, b| {
            a.category
                .as_str()
                .cmp(b.category.as_str())
                .then(a.sequence.cmp(&b.sequence))
                .then_with(|| a.filename.cmp(&b.filename))
        });

        tracing::debug!(total = images.len(), "Listed gallery images");
        Ok(images)
    }

    /// Store an image as the next sequence number of `category`.
    ///
    /// Type and size are checked before anything touches the disk.
    pub async fn upload(
        &self,
        category: Category,
        data: &[u8],
        declared_mime: &str,
    ) -> AppResult<UploadOutcome> {
        let format = ImageFormat::from_mime_type(declared_mime).ok_or_else(|| {
            AppError::Validation(
                "Invalid file type. Only JPG, PNG, and WebP images are allowed.".to_string(),
            )
        })?;
        if data.len() > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "File too large. Maximum size is {}MB.",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }

        let _guard = self.locks.get(category).lock().await;

        let dir = self.layout.category_dir(category);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::io("Failed to create category directory", &e))?;

        self.recover_staged(category).await?;

        // The directory, not the manifest, decides the next number.
        let next = next_sequence(&self.layout.scan(category).await?)?;
        let filename = format!("{next}.{}", format.extension());
        write_new(&dir.join(&filename), data).await?;

        let image = self
            .layout
            .scan(category)
            .await?
            .into_iter()
            .find(|image| image.filename == filename)
            .ok_or_else(|| AppError::FileSystem(format!("Uploaded file {filename} vanished")))?;

        tracing::info!(category = %category, filename = %filename, size = image.size, "Gallery upload");

        let (manifest, warning) = self.sync_manifest().await;
        Ok(UploadOutcome {
            image,
            manifest,
            warning,
        })
    }

    /// Delete one image and close the gap it leaves.
    pub async fn delete(&self, category: Category, filename: &str) -> AppResult<DeleteOutcome> {
        validate_filename(filename)?;

        let _guard = self.locks.get(category).lock().await;

        let path = self.layout.category_dir(category).join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound("File not found".to_string()));
            }
            Err(e) => return Err(AppError::io("Failed to delete image", &e)),
        }
        tracing::info!(category = %category, filename = %filename, "Deleted gallery image");

        self.renumber(category).await?;

        let (manifest, warning) = self.sync_manifest().await;
        Ok(DeleteOutcome {
            deleted: format!("{category}/{filename}"),
            manifest,
            warning,
        })
    }

    /// Delete several images. Each entry succeeds or fails on its own; every
    /// category that lost a file is renumbered once, after all its deletions.
    pub async fn delete_bulk(&self, items: Vec<ImageRef>) -> AppResult<BulkDeleteOutcome> {
        let involved: HashSet<Category> = items
            .iter()
            .filter_map(|item| item.category.parse().ok())
            .collect();

        // Fixed lock order keeps concurrent bulk deletes from deadlocking.
        let mut guards = Vec::new();
        for category in Category::ALL {
            if involved.contains(&category) {
                guards.push(self.locks.get(category).lock().await);
            }
        }

        let mut deleted = Vec::new();
        let mut errors = Vec::new();
        let mut affected = HashSet::new();

        for item in &items {
            let category: Category = match item.category.parse() {
                Ok(category) => category,
                Err(_) => {
                    errors.push(format!(
                        "Invalid category for {}: {}",
                        item.filename, item.category
                    ));
                    continue;
                }
            };
            if let Err(e) = validate_filename(&item.filename) {
                errors.push(format!("{e}: {}", item.filename));
                continue;
            }

            let path = self.layout.category_dir(category).join(&item.filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(category = %category, filename = %item.filename, "Deleted gallery image");
                    deleted.push(format!("{category}/{}", item.filename));
                    affected.insert(category);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    errors.push(format!("File not found: {}", item.filename));
                }
                Err(e) => {
                    errors.push(format!("Error deleting {}: {e}", item.filename));
                }
            }
        }

        let mut renumbered_categories = Vec::new();
        for category in Category::ALL {
            if affected.contains(&category) {
                self.renumber(category).await?;
                renumbered_categories.push(category);
            }
        }
        drop(guards);

        let (manifest, warning) = self.sync_manifest().await;
        Ok(BulkDeleteOutcome {
            deleted_count: deleted.len(),
            deleted,
            errors,
            manifest,
            renumbered_categories,
            warning,
        })
    }

    /// Renumber a category to `1..=n`, preserving order. The caller holds the
    /// category lock.
    ///
    /// Every file is first moved to a non-numeric temporary name, so no
    /// rename in the second pass can land on a file that has not moved yet.
    /// Temporary files left by an interrupted run are folded back in first.
    async fn renumber(&self, category: Category) -> AppResult<usize> {
        self.recover_staged(category).await?;

        let images = self.layout.scan(category).await?;
        let in_place = images
            .iter()
            .enumerate()
            .all(|(i, image)| image.sequence == i as u64 + 1);
        if in_place {
            return Ok(images.len());
        }

        let dir = self.layout.category_dir(category);
        let run = chrono::Utc::now().timestamp_micros();
        let mut staged = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let ext = extension_of(&image.filename);
            let temp = dir.join(format!("{STAGED_PREFIX}{run}-{}.{ext}", i + 1));
            if let Err(e) = rename_fresh(&dir.join(&image.filename), &temp).await {
                self.abandon_renumber(category).await;
                return Err(AppError::io(format!("Failed to rename {}", image.filename), &e));
            }
            staged.push((temp, ext));
        }

        for (i, (temp, ext)) in staged.iter().enumerate() {
            if let Err(e) = rename_fresh(temp, &dir.join(format!("{}.{ext}", i + 1))).await {
                self.abandon_renumber(category).await;
                return Err(AppError::io("Failed to finish renumbering", &e));
            }
        }

        tracing::info!(category = %category, count = images.len(), "Renumbered gallery");
        Ok(images.len())
    }

    /// Best-effort cleanup after a failed renumber, so no image is left
    /// under a temporary name.
    async fn abandon_renumber(&self, category: Category) {
        if let Err(e) = self.recover_staged(category).await {
            tracing::error!(category = %category, error = %e, "Could not recover staged gallery files");
        }
    }

    /// Give files left under temporary renumber names a managed name again.
    ///
    /// A staged file goes back to the position it was staged for when that
    /// number is free, otherwise after the last image. Returns how many
    /// files were recovered. The caller holds the category lock.
    async fn recover_staged(&self, category: Category) -> AppResult<usize> {
        let dir = self.layout.category_dir(category);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::io(format!("Error reading {category}"), &e)),
        };

        let mut stale = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::io(format!("Error reading {category}"), &e))?
        {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(key) = staged_position(&filename) {
                stale.push((key, filename));
            }
        }
        if stale.is_empty() {
            return Ok(0);
        }
        stale.sort();

        let mut taken: HashSet<u64> = self
            .layout
            .scan(category)
            .await?
            .iter()
            .map(|image| image.sequence)
            .collect();
        for ((_, position), filename) in &stale {
            let sequence = if taken.contains(position) {
                taken
                    .iter()
                    .max()
                    .copied()
                    .unwrap_or(0)
                    .checked_add(1)
                    .ok_or_else(sequence_exhausted)?
            } else {
                *position
            };
            let target = format!("{sequence}.{}", extension_of(filename));
            rename_fresh(&dir.join(filename), &dir.join(&target))
                .await
                .map_err(|e| AppError::io(format!("Failed to recover {filename}"), &e))?;
            taken.insert(sequence);
            tracing::warn!(category = %category, from = %filename, to = %target, "Recovered staged gallery file");
        }
        Ok(stale.len())
    }

    /// Recompute and persist the manifest after a mutation. A failed write
    /// does not undo the mutation; it is reported as a warning instead.
    async fn sync_manifest(&self) -> (GalleryManifest, Option<String>) {
        match self.manifest.refresh().await {
            Ok(manifest) => (manifest, None),
            Err(e) => {
                tracing::warn!(error = %e, "Gallery changed but manifest update failed");
                (
                    self.manifest.read().await,
                    Some("Files updated but manifest update failed".to_string()),
                )
            }
        }
    }
}

/// Name prefix of files moved aside during a renumber.
const STAGED_PREFIX: &str = ".renumber-";

/// `(run, position)` of a staged renumber file such as
/// `.renumber-1739000000000000-3.jpg`. Names without a run id sort first.
fn staged_position(filename: &str) -> Option<(i64, u64)> {
    let rest = filename.strip_prefix(STAGED_PREFIX)?;
    let (body, ext) = rest.rsplit_once('.')?;
    ImageFormat::from_extension(ext)?;
    let (run, position) = match body.rsplit_once('-') {
        Some((run, position)) => (run.parse().ok()?, position),
        None => (0, body),
    };
    if position.is_empty() || !position.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((run, position.parse().ok()?))
}

/// One past the highest sequence in use.
fn next_sequence(images: &[GalleryImage]) -> AppResult<u64> {
    images
        .iter()
        .map(|image| image.sequence)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(sequence_exhausted)
}

fn sequence_exhausted() -> AppError {
    AppError::FileSystem("No sequence numbers left in this category".to_string())
}

/// Rename that refuses to replace an existing file. Only sound while the
/// category lock is held.
async fn rename_fresh(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(to).await? {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    tokio::fs::rename(from, to).await
}

fn extension_of(filename: &str) -> &str {
    filename.rsplit_once('.').map_or("", |(_, ext)| ext)
}

/// A delete target must be a bare file name inside the category directory.
fn validate_filename(filename: &str) -> AppResult<()> {
    let bare = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
        && Path::new(filename).file_name().is_some();
    if bare {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid filename".to_string()))
    }
}

async fn write_new(path: &Path, data: &[u8]) -> AppResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                AppError::FileSystem("File with sequence number already exists".to_string())
            } else {
                AppError::io("Failed to save uploaded file", &e)
            }
        })?;
    file.write_all(data)
        .await
        .map_err(|e| AppError::io("Failed to save uploaded file", &e))?;
    file.flush()
        .await
        .map_err(|e| AppError::io("Failed to save uploaded file", &e))?;
    Ok(())
}
