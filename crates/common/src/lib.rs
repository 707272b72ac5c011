//! Common utilities and shared types for showroom.
//!
//! This crate provides foundational components used across all showroom crates:
//!
//! - **Configuration**: Server settings and on-disk site layout via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Storage**: File storage backends rooted at the document root
//!
//! # Example
//!
//! ```no_run
//! use showroom_common::{AppResult, Config};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Collections: {}", config.storage.collections_path().display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod storage;

pub use config::{Config, ServerConfig, StorageConfig};
pub use error::{AppError, AppResult};
pub use storage::{LocalStorage, StorageBackend, UploadedFile};
