use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Subscription;
use crate::services::CreativeBlock;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ---- Auth ----

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub account_id: i32,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateVerificationRequest {
    pub account_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub account_id: i32,
    pub secret: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

// ---- Account ----

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawCreditsRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceDto {
    pub balance: i64,
}

// ---- Billing ----

#[derive(Debug, Deserialize)]
pub struct TopUpInvoiceRequest {
    pub tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDto {
    pub tier: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionDto {
    fn from(sub: Subscription) -> Self {
        Self {
            tier: sub.tier,
            status: sub.status,
            started_at: sub.started_at,
            ends_at: sub.ends_at,
        }
    }
}

// ---- Creatives ----

#[derive(Debug, Deserialize)]
pub struct SaveCreativesRequest {
    pub blocks: Vec<CreativeBlock>,
}

#[derive(Debug, Serialize)]
pub struct SaveCreativesResponse {
    pub total_blocks: usize,
}

#[derive(Debug, Serialize)]
pub struct CreativesDto {
    pub blocks: Vec<CreativeBlock>,
}

#[derive(Debug, Serialize)]
pub struct UploadedObjectDto {
    pub key: String,
    pub url: String,
}
