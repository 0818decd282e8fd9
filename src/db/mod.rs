use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Statement,
    TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::account::Account;
pub use repositories::subscription::Subscription;
pub use repositories::ticket::Ticket;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains("::memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    fn ticket_repo(&self) -> repositories::ticket::TicketRepository {
        repositories::ticket::TicketRepository::new(self.conn.clone())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    fn payment_reference_repo(&self) -> repositories::payment_reference::PaymentReferenceRepository
    {
        repositories::payment_reference::PaymentReferenceRepository::new(self.conn.clone())
    }

    fn creative_repo(&self) -> repositories::creative::CreativeRepository {
        repositories::creative::CreativeRepository::new(self.conn.clone())
    }

    // ========== Accounts ==========

    pub async fn create_local_account(
        &self,
        email: &str,
        nickname: &str,
        password_hash: String,
        starting_balance: i64,
    ) -> Result<Account> {
        self.account_repo()
            .create_local(email, nickname, password_hash, starting_balance)
            .await
    }

    pub async fn create_google_account(
        &self,
        email: &str,
        nickname: &str,
        google_id: &str,
        starting_balance: i64,
    ) -> Result<Account> {
        self.account_repo()
            .create_google(email, nickname, google_id, starting_balance)
            .await
    }

    pub async fn get_account(&self, id: i32) -> Result<Option<Account>> {
        self.account_repo().get(id).await
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_email(email).await
    }

    pub async fn get_account_by_google_id(&self, google_id: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_google_id(google_id).await
    }

    pub async fn get_account_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(Account, Option<String>)>> {
        self.account_repo().get_by_email_with_password(email).await
    }

    pub async fn get_account_password_hash(&self, id: i32) -> Result<Option<Option<String>>> {
        self.account_repo().get_password_hash(id).await
    }

    pub async fn account_balance(&self, id: i32) -> Result<Option<i64>> {
        self.account_repo().balance(id).await
    }

    pub async fn debit_account(&self, id: i32, amount: i64) -> Result<u64> {
        self.account_repo().debit(id, amount).await
    }

    pub async fn credit_account(&self, id: i32, amount: i64) -> Result<u64> {
        self.account_repo().credit(id, amount).await
    }

    pub async fn apply_monthly_reset(
        &self,
        id: i32,
        old_anchor: DateTime<Utc>,
        new_anchor: DateTime<Utc>,
        balance: i64,
    ) -> Result<u64> {
        self.account_repo()
            .apply_monthly_reset(id, old_anchor, new_anchor, balance)
            .await
    }

    pub async fn set_account_verified(&self, id: i32) -> Result<()> {
        self.account_repo().set_verified(id).await
    }

    pub async fn update_account_nickname(&self, id: i32, nickname: &str) -> Result<()> {
        self.account_repo().update_nickname(id, nickname).await
    }

    pub async fn update_account_password_hash(&self, id: i32, hash: String) -> Result<()> {
        self.account_repo().update_password_hash(id, hash).await
    }

    pub async fn delete_account(&self, id: i32) -> Result<bool> {
        self.account_repo().delete(id).await
    }

    // ========== Tickets ==========

    pub async fn replace_ticket(
        &self,
        account_id: i32,
        kind: &str,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Ticket> {
        self.ticket_repo()
            .replace(account_id, kind, secret_hash, expires_at)
            .await
    }

    pub async fn find_ticket(&self, account_id: i32, kind: &str) -> Result<Option<Ticket>> {
        self.ticket_repo().find(account_id, kind).await
    }

    pub async fn delete_ticket(&self, account_id: i32, kind: &str) -> Result<u64> {
        self.ticket_repo().delete(account_id, kind).await
    }

    pub async fn delete_account_tickets(&self, account_id: i32) -> Result<u64> {
        self.ticket_repo().delete_all_for_account(account_id).await
    }

    // ========== Subscriptions ==========

    pub async fn get_subscription(&self, account_id: i32) -> Result<Option<Subscription>> {
        self.subscription_repo().get_by_account(account_id).await
    }

    pub async fn create_or_renew_subscription(
        &self,
        account_id: i32,
        tier: &str,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        self.subscription_repo()
            .create_or_renew(account_id, tier, now)
            .await
    }

    pub async fn cancel_subscription(&self, account_id: i32) -> Result<bool> {
        self.subscription_repo().cancel(account_id).await
    }

    /// Renewal plus the accompanying bonus credit in one transaction, so a
    /// failed credit can never leave a renewed subscription behind without
    /// its tokens. `None` means the account no longer exists; nothing was
    /// written.
    pub async fn apply_subscription_payment(
        &self,
        account_id: i32,
        tier: &str,
        bonus_tokens: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let txn = self.conn.begin().await?;

        if crate::entities::accounts::Entity::find_by_id(account_id)
            .one(&txn)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let subscription =
            repositories::subscription::create_or_renew_on(&txn, account_id, tier, now).await?;
        if bonus_tokens > 0 {
            repositories::account::credit_on(&txn, account_id, bonus_tokens).await?;
        }

        txn.commit().await?;
        Ok(Some(subscription))
    }

    pub async fn expire_due_subscriptions(&self, now: DateTime<Utc>) -> Result<u64> {
        self.subscription_repo().expire_due(now).await
    }

    // ========== Payment references ==========

    pub async fn claim_payment_reference(
        &self,
        reference: &str,
        account_id: i32,
        kind: &str,
    ) -> Result<bool> {
        self.payment_reference_repo()
            .try_claim(reference, account_id, kind)
            .await
    }

    pub async fn release_payment_reference(&self, reference: &str) -> Result<()> {
        self.payment_reference_repo().release(reference).await
    }

    // ========== Creatives ==========

    pub async fn get_creative_blocks(&self, account_id: i32) -> Result<Option<serde_json::Value>> {
        self.creative_repo().get_blocks(account_id).await
    }

    pub async fn append_creative_blocks(
        &self,
        account_id: i32,
        blocks: Vec<serde_json::Value>,
    ) -> Result<usize> {
        self.creative_repo().append_blocks(account_id, blocks).await
    }

    pub async fn delete_account_creatives(
        &self,
        account_id: i32,
    ) -> Result<Option<serde_json::Value>> {
        self.creative_repo().delete_by_account(account_id).await
    }
}
