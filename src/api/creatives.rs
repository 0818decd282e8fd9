//! Creative document endpoints: save and fetch blocks, upload visuals.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthAccount;
use super::types::{ApiResponse, CreativesDto, SaveCreativesRequest, SaveCreativesResponse,
    UploadedObjectDto};
use super::{ApiError, AppState};

pub async fn save_creatives(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(body): Json<SaveCreativesRequest>,
) -> Result<Json<ApiResponse<SaveCreativesResponse>>, ApiError> {
    let total_blocks = state.shared.creatives.save(account_id, body.blocks).await?;
    Ok(Json(ApiResponse::success(SaveCreativesResponse {
        total_blocks,
    })))
}

pub async fn get_creatives(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<CreativesDto>>, ApiError> {
    let blocks = state.shared.creatives.get(account_id).await?;
    Ok(Json(ApiResponse::success(CreativesDto { blocks })))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original file name; only the extension is kept.
    pub filename: Option<String>,
}

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Raw image upload. The stored key is namespaced per account and
/// randomized so uploads never collide or overwrite each other.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<UploadedObjectDto>>, ApiError> {
    let Some(storage) = &state.shared.storage else {
        return Err(ApiError::validation("Object storage is disabled"));
    };

    if body.is_empty() {
        return Err(ApiError::validation("Upload body is empty"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::validation("Upload exceeds 5 MiB"));
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(ApiError::validation("Only image uploads are accepted"));
    }

    let extension = query
        .filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ext.chars().all(char::is_alphanumeric) && ext.len() <= 5)
        .unwrap_or_else(|| "bin".to_string());

    let key = format!("creatives/{account_id}/{}.{extension}", Uuid::new_v4());
    let url = storage
        .upload(&key, &content_type, body.to_vec())
        .await
        .map_err(|err| ApiError::ExternalApiError {
            service: "Storage".to_string(),
            message: err.to_string(),
        })?;

    Ok(Json(ApiResponse::success(UploadedObjectDto { key, url })))
}
