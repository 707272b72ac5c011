//! Business logic services.

#![allow(missing_docs)]

pub mod category;
pub mod collection;
pub mod collection_image;
pub mod editor;
pub mod gallery;
pub mod manifest;
pub mod media;

pub use category::Category;
pub use collection::{CollectionItem, CollectionStore, SaveReceipt, backup_stamp};
pub use collection_image::{CollectionImageService, DataUrl, ImageUploadInput, StoredImage};
pub use editor::{
    CollectionEditor, EditorCommand, EditorMode, EditorOutcome, ItemDraft, PendingUpload, slugify,
};
pub use gallery::{
    BulkDeleteOutcome, DeleteOutcome, GalleryImage, GalleryLayout, GallerySequencer, ImageRef,
    UploadOutcome,
};
pub use manifest::{GalleryManifest, ManifestTracker};
pub use media::ImageFormat;
