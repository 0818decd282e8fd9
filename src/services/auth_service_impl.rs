//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::api::validation::{validate_email, validate_password};
use crate::clients::google::GoogleClient;
use crate::clients::mailer::Mailer;
use crate::config::SecurityConfig;
use crate::constants::{providers, tickets, tokens};
use crate::db::repositories::account::{generate_secret, hash_secret, verify_secret};
use crate::db::{Account, Store, Ticket};
use crate::services::auth_service::{AccountInfo, AuthError, AuthService, SessionTokens};
use crate::services::creatives::CreativeService;
use crate::services::ledger::LedgerService;
use crate::services::tokens::TokenKeys;

pub struct SeaOrmAuthService {
    store: Store,
    ledger: LedgerService,
    keys: TokenKeys,
    mailer: Arc<Mailer>,
    google: Option<Arc<GoogleClient>>,
    creatives: Arc<CreativeService>,
    security: SecurityConfig,
    starting_balance: i64,
}

impl SeaOrmAuthService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        store: Store,
        ledger: LedgerService,
        keys: TokenKeys,
        mailer: Arc<Mailer>,
        google: Option<Arc<GoogleClient>>,
        creatives: Arc<CreativeService>,
        security: SecurityConfig,
        starting_balance: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            keys,
            mailer,
            google,
            creatives,
            security,
            starting_balance,
        }
    }

    fn account_info(account: Account) -> AccountInfo {
        AccountInfo {
            id: account.id,
            email: account.email,
            nickname: account.nickname,
            provider: account.provider,
            role: account.role,
            verified: account.verified,
            token_balance: account.token_balance,
            created_at: account.created_at,
        }
    }

    async fn session_for(&self, account_id: i32) -> Result<SessionTokens, AuthError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        let pair = self.keys.issue_pair(account.id)?;

        Ok(SessionTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            account: Self::account_info(account),
        })
    }

    /// Creates a ticket with a fresh secret and returns the secret so it
    /// can be mailed. Only the hash is persisted.
    async fn issue_ticket(
        &self,
        account_id: i32,
        kind: &str,
        ttl_hours: i64,
    ) -> Result<String, AuthError> {
        let secret = generate_secret();
        let secret_hash = hash_secret(secret.clone(), &self.security).await?;
        self.store
            .replace_ticket(
                account_id,
                kind,
                secret_hash,
                Utc::now() + Duration::hours(ttl_hours),
            )
            .await?;
        Ok(secret)
    }

    /// Expiry check first: expired tickets are deleted on detection, then
    /// the secret is compared against the stored hash.
    async fn consume_ticket_checks(
        &self,
        ticket: &Ticket,
        kind: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        if ticket.expires_at < Utc::now() {
            self.store.delete_ticket(ticket.account_id, kind).await?;
            return Err(AuthError::TicketExpired);
        }

        let matches = verify_secret(ticket.secret_hash.clone(), secret.to_string()).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }

    fn send_verification_mail(&self, email: String, account_id: i32, secret: String) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_verification(&email, account_id, &secret).await {
                warn!(account_id, %err, "Failed to send verification mail");
            }
        });
    }

    fn send_reset_mail(&self, email: String, account_id: i32, secret: String) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_password_reset(&email, account_id, &secret).await {
                warn!(account_id, %err, "Failed to send password reset mail");
            }
        });
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, email: &str, password: &str) -> Result<AccountInfo, AuthError> {
        let email = email.trim().to_lowercase();
        validate_email(&email).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;

        if self.store.get_account_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_secret(password.to_string(), &self.security).await?;
        let nickname = email.split('@').next().unwrap_or(&email).to_string();
        let account = self
            .store
            .create_local_account(&email, &nickname, password_hash, self.starting_balance)
            .await?;

        let secret = self
            .issue_ticket(
                account.id,
                tickets::VERIFICATION,
                tickets::VERIFICATION_TTL_HOURS,
            )
            .await?;
        self.send_verification_mail(account.email.clone(), account.id, secret);

        info!(account_id = account.id, "Account created, verification pending");
        Ok(Self::account_info(account))
    }

    async fn verify_email(
        &self,
        account_id: i32,
        secret: &str,
    ) -> Result<SessionTokens, AuthError> {
        let ticket = self
            .store
            .find_ticket(account_id, tickets::VERIFICATION)
            .await?
            .ok_or(AuthError::TicketNotFound)?;

        self.consume_ticket_checks(&ticket, tickets::VERIFICATION, secret)
            .await?;

        self.store.set_account_verified(account_id).await?;
        self.store
            .delete_ticket(account_id, tickets::VERIFICATION)
            .await?;

        info!(account_id, "Email verified");
        self.session_for(account_id).await
    }

    async fn regenerate_verification(&self, account_id: i32) -> Result<(), AuthError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        if account.verified {
            return Err(AuthError::AlreadyVerified);
        }

        if let Some(ticket) = self
            .store
            .find_ticket(account_id, tickets::VERIFICATION)
            .await?
        {
            if ticket.expires_at >= Utc::now() {
                return Err(AuthError::VerificationPending);
            }
            self.store
                .delete_ticket(account_id, tickets::VERIFICATION)
                .await?;
        }

        let secret = self
            .issue_ticket(
                account_id,
                tickets::VERIFICATION,
                tickets::VERIFICATION_TTL_HOURS,
            )
            .await?;
        self.send_verification_mail(account.email, account_id, secret);
        Ok(())
    }

    async fn signin(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let email = email.trim().to_lowercase();

        // Unknown email, federated account, and bad password all fail the
        // same way.
        let Some((account, password_hash)) =
            self.store.get_account_by_email_with_password(&email).await?
        else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(password_hash) = password_hash else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_secret(password_hash, password.to_string()).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !account.verified {
            return Err(AuthError::NotVerified);
        }

        if let Err(err) = self.ledger.reset_if_due(account.id).await {
            // Sign-in still succeeds; the next sign-in retries the reset.
            warn!(account_id = account.id, %err, "Monthly reset failed during sign-in");
        }

        self.session_for(account.id).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.keys.verify(refresh_token, tokens::REFRESH)?;

        if self.store.get_account(claims.sub).await?.is_none() {
            return Err(AuthError::InvalidToken);
        }

        Ok(self.keys.issue_access(claims.sub)?)
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim().to_lowercase();

        // Silent success for unknown or federated emails keeps the endpoint
        // from confirming which addresses are registered.
        let Some((account, password_hash)) =
            self.store.get_account_by_email_with_password(&email).await?
        else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };
        if password_hash.is_none() || account.provider != providers::LOCAL {
            debug!(account_id = account.id, "Password reset requested for federated account");
            return Ok(());
        }

        let secret = self
            .issue_ticket(
                account.id,
                tickets::PASSWORD_RESET,
                tickets::PASSWORD_RESET_TTL_HOURS,
            )
            .await?;
        self.send_reset_mail(account.email, account.id, secret);
        Ok(())
    }

    async fn reset_password(
        &self,
        account_id: i32,
        secret: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password).map_err(AuthError::Validation)?;

        let ticket = self
            .store
            .find_ticket(account_id, tickets::PASSWORD_RESET)
            .await?
            .ok_or(AuthError::TicketNotFound)?;

        self.consume_ticket_checks(&ticket, tickets::PASSWORD_RESET, secret)
            .await?;

        let hash = hash_secret(new_password.to_string(), &self.security).await?;
        self.store
            .update_account_password_hash(account_id, hash)
            .await?;
        self.store
            .delete_ticket(account_id, tickets::PASSWORD_RESET)
            .await?;

        info!(account_id, "Password reset completed");
        Ok(())
    }

    async fn google_sign_in(&self, id_token: &str) -> Result<SessionTokens, AuthError> {
        let google = self
            .google
            .as_ref()
            .ok_or_else(|| AuthError::GoogleAuth("Google sign-in is disabled".to_string()))?;

        let identity = google
            .verify_id_token(id_token)
            .await
            .map_err(|err| AuthError::GoogleAuth(err.to_string()))?;

        let account = if let Some(existing) = self
            .store
            .get_account_by_google_id(&identity.subject)
            .await?
        {
            existing
        } else if let Some(by_email) = self.store.get_account_by_email(&identity.email).await? {
            // Same verified email, previously registered locally; sign in
            // to the existing account.
            by_email
        } else {
            let nickname = identity
                .name
                .clone()
                .unwrap_or_else(|| {
                    identity
                        .email
                        .split('@')
                        .next()
                        .unwrap_or(&identity.email)
                        .to_string()
                });
            self.store
                .create_google_account(
                    &identity.email,
                    &nickname,
                    &identity.subject,
                    self.starting_balance,
                )
                .await?
        };

        if let Err(err) = self.ledger.reset_if_due(account.id).await {
            warn!(account_id = account.id, %err, "Monthly reset failed during sign-in");
        }

        self.session_for(account.id).await
    }

    async fn me(&self, account_id: i32) -> Result<AccountInfo, AuthError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        Ok(Self::account_info(account))
    }

    async fn update_nickname(&self, account_id: i32, nickname: &str) -> Result<(), AuthError> {
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.chars().count() > 64 {
            return Err(AuthError::Validation(
                "Nickname must be 1-64 characters".to_string(),
            ));
        }
        if self.store.get_account(account_id).await?.is_none() {
            return Err(AuthError::AccountNotFound);
        }
        self.store
            .update_account_nickname(account_id, nickname)
            .await?;
        Ok(())
    }

    async fn change_password(
        &self,
        account_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password).map_err(AuthError::Validation)?;
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must differ from the current one".to_string(),
            ));
        }

        let hash = self
            .store
            .get_account_password_hash(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?
            .ok_or(AuthError::PasswordUnsupported)?;

        if !verify_secret(hash, current_password.to_string()).await? {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = hash_secret(new_password.to_string(), &self.security).await?;
        self.store
            .update_account_password_hash(account_id, new_hash)
            .await?;

        info!(account_id, "Password changed");
        Ok(())
    }

    async fn delete_account(&self, account_id: i32) -> Result<(), AuthError> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(AuthError::AccountNotFound);
        }

        self.creatives
            .delete_for_account(account_id)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        self.store.delete_account_tickets(account_id).await?;
        self.store.cancel_subscription(account_id).await?;
        self.store.delete_account(account_id).await?;

        info!(account_id, "Account deleted");
        Ok(())
    }
}
