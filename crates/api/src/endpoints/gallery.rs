//! Gallery endpoints.

use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use showroom_common::{AppError, AppResult};
use showroom_core::{
    BulkDeleteOutcome, Category, DeleteOutcome, GalleryImage, GalleryManifest, ImageRef,
};

use crate::{extractors::JsonBody, middleware::AppState, response::ApiResponse};

/// Listing filter.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub images: Vec<GalleryImage>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub path: String,
    pub category: Category,
    pub sequence: u64,
    pub size: u64,
    pub manifest: GalleryManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Single (`category` + `filename`) or bulk (`bulk: true` + `images`)
/// delete request.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub bulk: bool,
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: BulkDeleteOutcome,
}

/// List managed gallery images, optionally for one category.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ListResponse>> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(name.parse::<Category>()?),
    };

    let images = state.gallery.list(category).await?;
    Ok(ApiResponse::ok(ListResponse {
        total: images.len(),
        images,
    }))
}

/// Upload one image as the next sequence number of a category.
///
/// Multipart fields: `category` (text) and `image` (file).
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ApiResponse<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|e| AppError::BadRequest(format!("Form parsing error: {e}")))?;

    let mut category: Option<String> = None;
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Form parsing error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "category" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Form parsing error: {e}")))?;
                category = Some(text);
            }
            "image" => {
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Form parsing error: {e}")))?;
                image = Some((data.to_vec(), content_type));
            }
            _ => {}
        }
    }

    let category: Category = category.as_deref().unwrap_or("").trim().parse()?;
    let (data, content_type) =
        image.ok_or_else(|| AppError::BadRequest("No image file provided.".to_string()))?;

    let outcome = state
        .gallery
        .upload(category, &data, &content_type)
        .await?;

    Ok(ApiResponse::ok(UploadResponse {
        filename: outcome.image.filename,
        path: outcome.image.path,
        category: outcome.image.category,
        sequence: outcome.image.sequence,
        size: outcome.image.size,
        manifest: outcome.manifest,
        warning: outcome.warning,
    }))
}

/// Delete one image, or several with `bulk: true`.
pub async fn delete(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeleteRequest>,
) -> AppResult<Response> {
    if let (true, Some(images)) = (req.bulk, req.images) {
        let outcome = state.gallery.delete_bulk(images).await?;
        let success = outcome.deleted_count > 0 || outcome.errors.is_empty();
        return Ok(Json(BulkDeleteResponse { success, outcome }).into_response());
    }

    match (req.category.as_deref(), req.filename.as_deref()) {
        (Some(category), Some(filename)) if !category.is_empty() && !filename.is_empty() => {
            let category: Category = category.parse()?;
            let outcome: DeleteOutcome = state.gallery.delete(category, filename).await?;
            Ok(ApiResponse::ok(outcome).into_response())
        }
        _ => Err(AppError::BadRequest(
            "Invalid delete request format".to_string(),
        )),
    }
}
