use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{
    AuthError, BillingError, CreativeError, GenerationError, LedgerError, SubscriptionError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    /// Authenticated but not allowed, e.g. balance too low for a debit.
    Forbidden(String),

    InternalError(String),

    Unauthorized(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ExternalApiError { service, message } => {
                write!(f, "{service} error: {message}")
            }
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{service} API error: {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} service is unavailable"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::NotVerified
            | AuthError::InvalidToken => Self::Unauthorized(err.to_string()),
            AuthError::EmailTaken
            | AuthError::AlreadyVerified
            | AuthError::VerificationPending => Self::Conflict(err.to_string()),
            AuthError::AccountNotFound | AuthError::TicketNotFound => {
                Self::NotFound(err.to_string())
            }
            AuthError::TicketExpired
            | AuthError::PasswordUnsupported
            | AuthError::Validation(_) => Self::ValidationError(err.to_string()),
            AuthError::GoogleAuth(message) => Self::ExternalApiError {
                service: "Google".to_string(),
                message,
            },
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => Self::NotFound("Account not found".to_string()),
            LedgerError::InsufficientBalance { .. } => Self::Forbidden(err.to_string()),
            LedgerError::InvalidAmount => Self::ValidationError(err.to_string()),
            LedgerError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::AccountNotFound => Self::NotFound("Account not found".to_string()),
            GenerationError::InsufficientBalance { .. } => Self::Forbidden(err.to_string()),
            GenerationError::Upstream(message) => Self::ExternalApiError {
                service: "Generation".to_string(),
                message,
            },
            GenerationError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NotFound => Self::NotFound(err.to_string()),
            SubscriptionError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Disabled => Self::ValidationError(err.to_string()),
            BillingError::InvalidAmount => Self::ValidationError(err.to_string()),
            BillingError::Upstream(message) => Self::ExternalApiError {
                service: "Payments".to_string(),
                message,
            },
        }
    }
}

impl From<CreativeError> for ApiError {
    fn from(err: CreativeError) -> Self {
        match err {
            CreativeError::Empty
            | CreativeError::TooManyBlocks(_)
            | CreativeError::InvalidBlock(_) => Self::ValidationError(err.to_string()),
            CreativeError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
