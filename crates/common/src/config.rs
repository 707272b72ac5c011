//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default upload limit (5 MiB) for gallery and collection images.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// On-disk layout of the managed site.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Also mount the `.php` endpoint names the existing admin pages call.
    #[serde(default = "default_true")]
    pub legacy_paths: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            legacy_paths: true,
        }
    }
}

/// Storage layout configuration.
///
/// Every relative path except `document_root` is resolved against the
/// document root.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory served as the static site.
    #[serde(default = "default_document_root")]
    pub document_root: PathBuf,
    /// Document served for `/`.
    #[serde(default = "default_index_document")]
    pub index_document: String,
    /// Canonical collections document.
    #[serde(default = "default_collections_file")]
    pub collections_file: String,
    /// Gallery count manifest.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Directory for collection images.
    #[serde(default = "default_collection_images_dir")]
    pub collection_images_dir: String,
    /// Root of the per-category gallery directories.
    #[serde(default = "default_gallery_dir")]
    pub gallery_dir: String,
    /// Maximum accepted image size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_root: default_document_root(),
            index_document: default_index_document(),
            collections_file: default_collections_file(),
            manifest_file: default_manifest_file(),
            collection_images_dir: default_collection_images_dir(),
            gallery_dir: default_gallery_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl StorageConfig {
    /// Layout rooted at `document_root` with every other setting defaulted.
    #[must_use]
    pub fn rooted_at(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            ..Self::default()
        }
    }

    /// Absolute path of the collections document.
    #[must_use]
    pub fn collections_path(&self) -> PathBuf {
        self.document_root.join(&self.collections_file)
    }

    /// Absolute path of the gallery manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.document_root.join(&self.manifest_file)
    }

    /// Absolute path of the gallery root.
    #[must_use]
    pub fn gallery_path(&self) -> PathBuf {
        self.document_root.join(&self.gallery_dir)
    }

    /// Absolute path of the index document.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.document_root.join(&self.index_document)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8888
}

const fn default_true() -> bool {
    true
}

fn default_document_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_index_document() -> String {
    "collection-management.html".to_string()
}

fn default_collections_file() -> String {
    "collections.json".to_string()
}

fn default_manifest_file() -> String {
    "gallery_manifest.json".to_string()
}

fn default_collection_images_dir() -> String {
    "img/collections".to_string()
}

fn default_gallery_dir() -> String {
    "img/gallery".to_string()
}

const fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `SHOWROOM_ENV`)
    /// 4. Environment variables with `SHOWROOM__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("SHOWROOM_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SHOWROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SHOWROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_site_layout() {
        let config = Config::default();
        assert_eq!(config.server.port, 8888);
        assert!(config.server.legacy_paths);
        assert_eq!(config.storage.collections_file, "collections.json");
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_paths_resolve_against_document_root() {
        let storage = StorageConfig::rooted_at("/srv/site");
        assert_eq!(
            storage.collections_path(),
            PathBuf::from("/srv/site/collections.json")
        );
        assert_eq!(
            storage.gallery_path(),
            PathBuf::from("/srv/site/img/gallery")
        );
        assert_eq!(
            storage.index_path(),
            PathBuf::from("/srv/site/collection-management.html")
        );
    }

    #[test]
    fn test_from_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("showroom.toml");
        std::fs::write(&path, "[server]\nport = 9000\n\n[storage]\ndocument_root = \"/tmp/site\"\n")
            .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.document_root, PathBuf::from("/tmp/site"));
        assert_eq!(config.storage.manifest_file, "gallery_manifest.json");
    }
}
