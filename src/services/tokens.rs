//! Signed session tokens: short-lived access + longer-lived refresh pair.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::tokens;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Wrong token kind: expected {expected}")]
    WrongKind { expected: &'static str },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: i32,
    pub exp: i64,
    pub iat: i64,
    /// "access" or "refresh".
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// HS256 signing keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_access(&self, account_id: i32) -> Result<String, TokenError> {
        self.issue(account_id, tokens::ACCESS, Duration::hours(tokens::ACCESS_TTL_HOURS))
    }

    pub fn issue_refresh(&self, account_id: i32) -> Result<String, TokenError> {
        self.issue(account_id, tokens::REFRESH, Duration::days(tokens::REFRESH_TTL_DAYS))
    }

    pub fn issue_pair(&self, account_id: i32) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(account_id)?,
            refresh_token: self.issue_refresh(account_id)?,
        })
    }

    fn issue(&self, account_id: i32, kind: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            kind: kind.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError::Invalid)
    }

    /// Decodes and validates a token, enforcing the expected kind so a
    /// refresh token cannot be presented where an access token is required.
    pub fn verify(&self, token: &str, expected_kind: &'static str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;

        if data.claims.kind != expected_kind {
            return Err(TokenError::WrongKind {
                expected: expected_kind,
            });
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_and_verifies_access_token() {
        let keys = TokenKeys::new("test-secret");
        let token = keys.issue_access(42).unwrap();
        let claims = keys.verify(&token, tokens::ACCESS).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.kind, tokens::ACCESS);
    }

    #[test]
    fn rejects_refresh_token_as_access() {
        let keys = TokenKeys::new("test-secret");
        let token = keys.issue_refresh(7).unwrap();
        let err = keys.verify(&token, tokens::ACCESS).unwrap_err();
        assert!(matches!(err, TokenError::WrongKind { .. }));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let keys = TokenKeys::new("secret-a");
        let other = TokenKeys::new("secret-b");
        let token = keys.issue_access(1).unwrap();
        assert!(matches!(
            other.verify(&token, tokens::ACCESS),
            Err(TokenError::Invalid)
        ));
    }
}
