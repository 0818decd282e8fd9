//! Authenticated account endpoints: profile, password, credits, deletion.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use super::auth::AuthAccount;
use super::types::{
    ApiResponse, BalanceDto, ChangePasswordRequest, UpdateAccountRequest, WithdrawCreditsRequest,
};
use super::{ApiError, AppState};
use crate::api::validation::validate_token_amount;
use crate::services::auth_service::AccountInfo;

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    let account = state.shared.auth.me(account_id).await?;
    Ok(Json(ApiResponse::success(account)))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    state
        .shared
        .auth
        .update_nickname(account_id, &body.nickname)
        .await?;
    let account = state.shared.auth.me(account_id).await?;
    Ok(Json(ApiResponse::success(account)))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .shared
        .auth
        .change_password(account_id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(ApiResponse::success("Password changed")))
}

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<BalanceDto>>, ApiError> {
    let balance = state.shared.ledger.balance(account_id).await?;
    Ok(Json(ApiResponse::success(BalanceDto { balance })))
}

pub async fn withdraw_credits(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(body): Json<WithdrawCreditsRequest>,
) -> Result<Json<ApiResponse<BalanceDto>>, ApiError> {
    let amount = validate_token_amount(body.amount)?;
    let balance = state.shared.ledger.debit(account_id, amount).await?;
    Ok(Json(ApiResponse::success(BalanceDto { balance })))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state.shared.auth.delete_account(account_id).await?;
    Ok(Json(ApiResponse::success("Account deleted")))
}
