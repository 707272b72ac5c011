//! Collection image upload endpoint.

use axum::extract::State;
use showroom_common::AppResult;
use showroom_core::{ImageUploadInput, StoredImage};

use crate::{extractors::JsonBody, middleware::AppState, response::ApiResponse};

/// Store a base64 data URL image under the collection images directory.
pub async fn upload(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ImageUploadInput>,
) -> AppResult<ApiResponse<StoredImage>> {
    let stored = state.images.upload(input).await?;
    Ok(ApiResponse::ok(stored))
}
