//! API endpoints.

mod collections;
mod gallery;
mod images;
mod manifest;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{MethodRouter, get, post},
};
use showroom_common::{AppError, Config};
use tower_http::services::{ServeDir, ServeFile};

use crate::middleware::{AppState, cors_layer, preflight_middleware};

/// Headroom over an encoded image for JSON fields and multipart framing.
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

/// Largest request body accepted: a maximum-size image in base64 plus
/// headroom, so the upload size check decides rather than the body limit.
const fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.div_ceil(3) * 4 + BODY_LIMIT_HEADROOM
}

/// Create the API router.
///
/// Paths are fixed; with `server.legacy_paths` the `.php` names used by the
/// existing admin pages are mounted as aliases. Anything else is served from
/// the document root.
pub fn router(config: &Config) -> Router<AppState> {
    let mut router = Router::new()
        .route("/collections.json", json_only(get(collections::list)))
        .route(
            "/api/collections",
            json_only(get(collections::list).post(collections::save)),
        )
        .route("/api/images", json_only(post(images::upload)))
        .route("/api/gallery", json_only(get(gallery::list)))
        .route(
            "/api/gallery/manifest",
            json_only(get(manifest::get).post(manifest::set)),
        )
        .route("/api/gallery/upload", json_only(post(gallery::upload)))
        .route("/api/gallery/delete", json_only(post(gallery::delete)));

    if config.server.legacy_paths {
        router = router
            .route(
                "/save-collections.php",
                json_only(get(collections::list).post(collections::save)),
            )
            .route("/upload-image.php", json_only(post(images::upload)))
            .route("/gallery-list.php", json_only(get(gallery::list)))
            .route(
                "/gallery-manifest.php",
                json_only(get(manifest::get).post(manifest::set)),
            )
            .route("/gallery-upload.php", json_only(post(gallery::upload)))
            .route("/gallery-delete.php", json_only(post(gallery::delete)));
    }

    let storage = &config.storage;
    router
        .route_service("/", ServeFile::new(storage.index_path()))
        .fallback_service(ServeDir::new(&storage.document_root))
        .layer(DefaultBodyLimit::max(body_limit(storage.max_upload_bytes)))
}

/// The complete application: routes, state, CORS and preflight handling.
pub fn app(state: AppState) -> Router {
    router(&state.config)
        .layer(cors_layer())
        // Outermost, so every OPTIONS request gets the fixed preflight answer.
        .layer(middleware::from_fn(preflight_middleware))
        .with_state(state)
}

/// Known path, wrong method: answer with a JSON error instead of an empty 405.
fn json_only(methods: MethodRouter<AppState>) -> MethodRouter<AppState> {
    methods.fallback(|| async { AppError::MethodNotAllowed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_fits_encoded_image() {
        let max: usize = 5 * 1024 * 1024;
        let encoded = max.div_ceil(3) * 4;
        assert!(body_limit(max) > encoded + "data:image/jpeg;base64,".len());
        assert_eq!(body_limit(3), 4 + BODY_LIMIT_HEADROOM);
    }
}
