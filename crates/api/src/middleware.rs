//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use showroom_common::{Config, LocalStorage};
use showroom_core::{
    CollectionImageService, CollectionStore, GalleryLayout, GallerySequencer, ManifestTracker,
};
use tower_http::cors::{Any, CorsLayer};

/// Methods advertised to browsers.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Request headers advertised to browsers.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub collections: CollectionStore,
    pub images: CollectionImageService,
    pub gallery: GallerySequencer,
}

impl AppState {
    /// Build every service from configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let storage_config = &config.storage;
        let max_upload_bytes = storage_config.max_upload_bytes;

        let storage = Arc::new(LocalStorage::new(
            storage_config.document_root.clone(),
            String::new(),
        ));
        let images = CollectionImageService::new(
            storage,
            storage_config.collection_images_dir.clone(),
            max_upload_bytes,
        );

        let layout = GalleryLayout::new(
            storage_config.gallery_path(),
            storage_config.gallery_dir.clone(),
        );
        let manifest = ManifestTracker::new(storage_config.manifest_path(), layout.clone());
        let gallery = GallerySequencer::new(layout, manifest, max_upload_bytes);

        let collections = CollectionStore::new(storage_config.collections_path());

        Self {
            config: Arc::new(config),
            collections,
            images,
            gallery,
        }
    }

    /// Manifest tracker shared with the gallery sequencer.
    #[must_use]
    pub const fn manifest(&self) -> &ManifestTracker {
        self.gallery.manifest()
    }
}

/// Answer every `OPTIONS` request with an empty 200, whatever the path.
pub async fn preflight_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }

    tracing::trace!(path = %req.uri().path(), "Preflight request");

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

/// CORS layer adding `Access-Control-Allow-Origin: *` to every response.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
