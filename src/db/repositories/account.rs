use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::constants::{providers, roles};
use crate::entities::accounts;

/// Account data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub nickname: String,
    pub provider: String,
    pub role: String,
    pub verified: bool,
    pub token_balance: i64,
    pub tokens_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            nickname: model.nickname,
            provider: model.provider,
            role: model.role,
            verified: model.verified,
            token_balance: model.token_balance,
            tokens_reset_at: model.tokens_reset_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create_local(
        &self,
        email: &str,
        nickname: &str,
        password_hash: String,
        starting_balance: i64,
    ) -> Result<Account> {
        let now = Utc::now();

        let active = accounts::ActiveModel {
            id: NotSet,
            email: Set(email.to_string()),
            nickname: Set(nickname.to_string()),
            password_hash: Set(Some(password_hash)),
            provider: Set(providers::LOCAL.to_string()),
            google_id: Set(None),
            role: Set(roles::USER.to_string()),
            verified: Set(false),
            token_balance: Set(starting_balance),
            tokens_reset_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert account")?;

        Ok(Account::from(model))
    }

    pub async fn create_google(
        &self,
        email: &str,
        nickname: &str,
        google_id: &str,
        starting_balance: i64,
    ) -> Result<Account> {
        let now = Utc::now();

        let active = accounts::ActiveModel {
            id: NotSet,
            email: Set(email.to_string()),
            nickname: Set(nickname.to_string()),
            password_hash: Set(None),
            provider: Set(providers::GOOGLE.to_string()),
            google_id: Set(Some(google_id.to_string())),
            role: Set(roles::USER.to_string()),
            verified: Set(true),
            token_balance: Set(starting_balance),
            tokens_reset_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert federated account")?;

        Ok(Account::from(model))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Account>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by id")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query account by email")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<Account>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::GoogleId.eq(google_id))
            .one(&self.conn)
            .await
            .context("Failed to query account by google id")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(Account, Option<String>)>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query account by email")?;

        Ok(account.map(|a| {
            let hash = a.password_hash.clone();
            (Account::from(a), hash)
        }))
    }

    pub async fn get_password_hash(&self, id: i32) -> Result<Option<Option<String>>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for password hash")?;

        Ok(account.map(|a| a.password_hash))
    }

    pub async fn balance(&self, id: i32) -> Result<Option<i64>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account balance")?;

        Ok(account.map(|a| a.token_balance))
    }

    /// Conditional decrement. Returns the number of affected rows: zero
    /// means the account is missing or the balance is too low — the caller
    /// distinguishes the two. Never read-then-write; the condition and the
    /// decrement travel in the same statement.
    pub async fn debit(&self, id: i32, amount: i64) -> Result<u64> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::TokenBalance,
                Expr::col(accounts::Column::TokenBalance).sub(amount),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Id.eq(id))
            .filter(accounts::Column::TokenBalance.gte(amount))
            .exec(&self.conn)
            .await
            .context("Failed to debit account")?;

        Ok(result.rows_affected)
    }

    /// Unconditional atomic increment. Zero rows affected means the
    /// account does not exist.
    pub async fn credit(&self, id: i32, amount: i64) -> Result<u64> {
        credit_on(&self.conn, id, amount).await
    }

    /// Compare-and-swap write of the monthly reset: the balance and the new
    /// anchor land only if the anchor is still the one the caller computed
    /// from. Zero rows affected means a concurrent reset already applied.
    pub async fn apply_monthly_reset(
        &self,
        id: i32,
        old_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
        balance: i64,
    ) -> Result<u64> {
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::TokenBalance, Expr::value(balance))
            .col_expr(accounts::Column::TokensResetAt, Expr::value(new_anchor))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Id.eq(id))
            .filter(accounts::Column::TokensResetAt.eq(old_anchor))
            .exec(&self.conn)
            .await
            .context("Failed to apply monthly reset")?;

        Ok(result.rows_affected)
    }

    pub async fn set_verified(&self, id: i32) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for verification")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.verified = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_nickname(&self, id: i32, nickname: &str) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for profile update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.nickname = Set(nickname.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_password_hash(&self, id: i32, hash: String) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for password update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.password_hash = Set(Some(hash));
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = accounts::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete account")?;

        Ok(result.rows_affected > 0)
    }
}

/// Credit core, runnable on a plain connection or inside a caller-owned
/// transaction.
pub async fn credit_on<C: ConnectionTrait>(conn: &C, id: i32, amount: i64) -> Result<u64> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::TokenBalance,
            Expr::col(accounts::Column::TokenBalance).add(amount),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(accounts::Column::Id.eq(id))
        .exec(conn)
        .await
        .context("Failed to credit account")?;

    Ok(result.rows_affected)
}

/// Verify a password or ticket secret against an Argon2 hash.
/// Runs in `spawn_blocking` because Argon2 is CPU-intensive and would
/// stall the async runtime if run inline.
pub async fn verify_secret(hash: String, candidate: String) -> Result<bool> {
    let is_valid = task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        let argon2 = Argon2::default();
        Ok::<bool, anyhow::Error>(
            argon2
                .verify_password(candidate.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Secret verification task panicked")??;

    Ok(is_valid)
}

/// Hash a password or ticket secret with Argon2id, params from config.
pub async fn hash_secret(secret: String, config: &SecurityConfig) -> Result<String> {
    let config = config.clone();
    task::spawn_blocking(move || hash_secret_blocking(&secret, &config))
        .await
        .context("Secret hashing task panicked")?
}

fn hash_secret_blocking(secret: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {e}"))?;

    Ok(hash.to_string())
}

/// Generate a random ticket secret (64 character hex string).
#[must_use]
pub fn generate_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
