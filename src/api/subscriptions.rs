//! Subscription status and cancellation.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use super::auth::AuthAccount;
use super::types::{ApiResponse, SubscriptionDto};
use super::{ApiError, AppState};

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<Option<SubscriptionDto>>>, ApiError> {
    let subscription = state.shared.subscriptions.status(account_id).await?;
    Ok(Json(ApiResponse::success(
        subscription.map(SubscriptionDto::from),
    )))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state.shared.subscriptions.cancel(account_id).await?;
    Ok(Json(ApiResponse::success("Subscription cancelled")))
}
