//! Bearer-token middleware and the public auth endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::types::{
    ApiResponse, GoogleSignInRequest, PasswordResetRequest, RefreshRequest, RefreshResponse,
    RegenerateVerificationRequest, ResetPasswordRequest, SigninRequest, SignupRequest,
    VerifyEmailRequest,
};
use super::{ApiError, AppState};
use crate::constants::tokens;
use crate::services::auth_service::{AccountInfo, SessionTokens};

/// Authenticated account id, inserted by [`auth_middleware`].
#[derive(Debug, Clone, Copy)]
pub struct AuthAccount(pub i32);

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let claims = state
        .shared
        .keys
        .verify(token, tokens::ACCESS)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    tracing::Span::current().record("user_id", claims.sub);
    req.extensions_mut().insert(AuthAccount(claims.sub));

    Ok(next.run(req).await)
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<ApiResponse<AccountInfo>>, ApiError> {
    let account = state.shared.auth.signup(&body.email, &body.password).await?;
    Ok(Json(ApiResponse::success(account)))
}

pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SigninRequest>,
) -> Result<Json<ApiResponse<SessionTokens>>, ApiError> {
    let session = state.shared.auth.signin(&body.email, &body.password).await?;
    Ok(Json(ApiResponse::success(session)))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let access_token = state.shared.auth.refresh(&body.refresh_token).await?;
    Ok(Json(ApiResponse::success(RefreshResponse { access_token })))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<SessionTokens>>, ApiError> {
    let session = state
        .shared
        .auth
        .verify_email(body.account_id, &body.secret)
        .await?;
    Ok(Json(ApiResponse::success(session)))
}

pub async fn regenerate_verification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegenerateVerificationRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .shared
        .auth
        .regenerate_verification(body.account_id)
        .await?;
    Ok(Json(ApiResponse::success("Verification mail sent")))
}

pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state.shared.auth.request_password_reset(&body.email).await?;
    Ok(Json(ApiResponse::success(
        "If the address is registered, a reset mail is on its way",
    )))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .shared
        .auth
        .reset_password(body.account_id, &body.secret, &body.new_password)
        .await?;
    Ok(Json(ApiResponse::success("Password updated")))
}

pub async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Json<ApiResponse<SessionTokens>>, ApiError> {
    let session = state.shared.auth.google_sign_in(&body.id_token).await?;
    Ok(Json(ApiResponse::success(session)))
}

/// Tokens are stateless; logout exists so clients have a definite endpoint
/// to call when discarding a session.
pub async fn logout() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Logged out"))
}
