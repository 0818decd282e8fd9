//! Domain service for account lifecycle and authentication.
//!
//! Covers signup, email verification, sign-in, token refresh, password
//! reset, Google sign-in, profile changes, and account deletion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::tokens::TokenError;

/// Errors specific to authentication and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Email not verified")]
    NotVerified,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("A verification link is already pending")]
    VerificationPending,

    #[error("No such ticket")]
    TicketNotFound,

    #[error("Ticket expired")]
    TicketExpired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password operations are not available for federated accounts")]
    PasswordUnsupported,

    #[error("Google sign-in failed: {0}")]
    GoogleAuth(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid | TokenError::WrongKind { .. } => {
                Self::InvalidToken
            }
        }
    }
}

/// Account profile DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub id: i32,
    pub email: String,
    pub nickname: String,
    pub provider: String,
    pub role: String,
    pub verified: bool,
    pub token_balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of any flow that establishes a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub account: AccountInfo,
}

/// Domain service trait for authentication and account management.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an unverified account and mails a verification link.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailTaken`] for a duplicate email and
    /// [`AuthError::Validation`] for a weak password or malformed email.
    async fn signup(&self, email: &str, password: &str) -> Result<AccountInfo, AuthError>;

    /// Consumes a verification ticket and issues a session.
    async fn verify_email(
        &self,
        account_id: i32,
        secret: &str,
    ) -> Result<SessionTokens, AuthError>;

    /// Issues a fresh verification ticket when none is live.
    async fn regenerate_verification(&self, account_id: i32) -> Result<(), AuthError>;

    /// Password sign-in. Applies the monthly token reset before issuing
    /// tokens.
    async fn signin(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;

    /// Creates a password-reset ticket and mails the link. Succeeds
    /// silently for unknown or federated emails.
    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Consumes a reset ticket and replaces the password.
    async fn reset_password(
        &self,
        account_id: i32,
        secret: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Verifies a Google id token and signs in, creating a verified
    /// federated account on first contact.
    async fn google_sign_in(&self, id_token: &str) -> Result<SessionTokens, AuthError>;

    /// Current profile.
    async fn me(&self, account_id: i32) -> Result<AccountInfo, AuthError>;

    async fn update_nickname(&self, account_id: i32, nickname: &str) -> Result<(), AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is wrong
    /// or the new one is too weak.
    async fn change_password(
        &self,
        account_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Deletes the account and cascades tickets, subscription, creatives,
    /// and stored creative objects.
    async fn delete_account(&self, account_id: i32) -> Result<(), AuthError>;
}
