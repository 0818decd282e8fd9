//! Paid text-generation endpoint.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use super::auth::AuthAccount;
use super::types::ApiResponse;
use super::{ApiError, AppState};
use crate::api::validation::{validate_brief_field, validate_variations};
use crate::services::generation::{AdBrief, GenerationResult};

pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(brief): Json<AdBrief>,
) -> Result<Json<ApiResponse<GenerationResult>>, ApiError> {
    validate_variations(brief.variations)?;
    validate_brief_field("country", &brief.country)?;
    validate_brief_field("language", &brief.language)?;
    validate_brief_field("vertical", &brief.vertical)?;

    let result = state.shared.generation.generate(account_id, &brief).await?;
    Ok(Json(ApiResponse::success(result)))
}
