//! Gallery manifest endpoints.

use axum::extract::State;
use serde::Serialize;
use showroom_common::AppResult;
use showroom_core::GalleryManifest;

use crate::{extractors::JsonBody, middleware::AppState, response::ApiResponse};

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub manifest: GalleryManifest,
}

/// Persisted manifest; zeros when missing or unreadable.
pub async fn get(State(state): State<AppState>) -> ApiResponse<ManifestResponse> {
    let manifest = state.manifest().read().await;
    ApiResponse::ok(ManifestResponse { manifest })
}

/// Overwrite the manifest with explicit counts.
pub async fn set(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> AppResult<ApiResponse<ManifestResponse>> {
    let manifest = state.manifest().write(&body).await?;
    Ok(ApiResponse::ok(ManifestResponse { manifest }))
}
