//! Collection catalog endpoints.

use axum::{Json, extract::State};
use chrono::SecondsFormat;
use serde::Serialize;
use showroom_common::{AppError, AppResult};
use showroom_core::CollectionItem;

use crate::{extractors::JsonBody, middleware::AppState, response::ApiResponse};

/// Response to a successful save.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: &'static str,
    pub count: usize,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

/// Current catalog. Never fails on a malformed document.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<CollectionItem>>> {
    let items = state.collections.load().await?;
    Ok(Json(items))
}

/// Replace the catalog.
pub async fn save(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> AppResult<ApiResponse<SaveResponse>> {
    let serde_json::Value::Array(entries) = body else {
        return Err(AppError::BadRequest(
            "Collections must be an array".to_string(),
        ));
    };

    let items = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            serde_json::from_value::<CollectionItem>(entry).map_err(|e| {
                AppError::BadRequest(format!("Invalid collection item at index {i}: {e}"))
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let receipt = state.collections.save(items).await?;

    Ok(ApiResponse::ok(SaveResponse {
        message: "Collections saved successfully",
        count: receipt.count,
        timestamp: receipt
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        backup: receipt
            .backup
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned()),
    }))
}
