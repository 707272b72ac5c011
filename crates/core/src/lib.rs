//! Core business logic for showroom.
//!
//! Everything here works directly against the site's document root: the
//! collections document, collection images, the per-category gallery
//! directories and the gallery manifest.

pub mod services;

pub use services::*;
