use anyhow::{Context, Result};
use chrono::{DateTime, Months, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, Set, TransactionTrait,
};

use crate::constants::subscription_status;
use crate::entities::subscriptions;

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i32,
    pub account_id: i32,
    pub tier: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<subscriptions::Model> for Subscription {
    fn from(model: subscriptions::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            tier: model.tier,
            status: model.status,
            started_at: model.started_at,
            ends_at: model.ends_at,
        }
    }
}

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_account(&self, account_id: i32) -> Result<Option<Subscription>> {
        let sub = subscriptions::Entity::find()
            .filter(subscriptions::Column::AccountId.eq(account_id))
            .one(&self.conn)
            .await
            .context("Failed to query subscription")?;

        Ok(sub.map(Subscription::from))
    }

    /// Create on first payment, extend on renewal. The read and the write
    /// share a transaction so two concurrent renewals (distinct references)
    /// both extend rather than clobber each other.
    pub async fn create_or_renew(
        &self,
        account_id: i32,
        tier: &str,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to begin subscription transaction")?;

        let subscription = create_or_renew_on(&txn, account_id, tier, now).await?;

        txn.commit()
            .await
            .context("Failed to commit subscription transaction")?;

        Ok(subscription)
    }

    pub async fn cancel(&self, account_id: i32) -> Result<bool> {
        let result = subscriptions::Entity::delete_many()
            .filter(subscriptions::Column::AccountId.eq(account_id))
            .exec(&self.conn)
            .await
            .context("Failed to cancel subscription")?;

        Ok(result.rows_affected > 0)
    }

    /// Expire every overdue active subscription in one conditional bulk
    /// UPDATE. Idempotent: a second run with the same `now` matches no
    /// rows. Safe under concurrent runs for the same reason.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = subscriptions::Entity::update_many()
            .col_expr(
                subscriptions::Column::Status,
                Expr::value(subscription_status::EXPIRED),
            )
            .col_expr(subscriptions::Column::UpdatedAt, Expr::value(now))
            .filter(subscriptions::Column::Status.eq(subscription_status::ACTIVE))
            .filter(subscriptions::Column::EndsAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to expire due subscriptions")?;

        Ok(result.rows_affected)
    }
}

/// Renewal core, runnable on a plain connection or inside a caller-owned
/// transaction (the reconciler commits it together with the bonus credit).
///
/// Extension never shortens: `ends_at = max(current ends_at, now) + 1
/// calendar month`, so paying early stacks remaining time and paying after
/// a lapse restarts from now.
pub async fn create_or_renew_on<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    tier: &str,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    let existing = subscriptions::Entity::find()
        .filter(subscriptions::Column::AccountId.eq(account_id))
        .one(conn)
        .await
        .context("Failed to query subscription for renewal")?;

    let model = if let Some(current) = existing {
        let base = if current.ends_at > now {
            current.ends_at
        } else {
            now
        };
        let new_end = base
            .checked_add_months(Months::new(1))
            .ok_or_else(|| anyhow::anyhow!("Subscription end date overflow"))?;

        let mut active: subscriptions::ActiveModel = current.into();
        active.tier = Set(tier.to_string());
        active.status = Set(subscription_status::ACTIVE.to_string());
        active.started_at = Set(now);
        active.ends_at = Set(new_end);
        active.updated_at = Set(now);
        active
            .update(conn)
            .await
            .context("Failed to renew subscription")?
    } else {
        let ends_at = now
            .checked_add_months(Months::new(1))
            .ok_or_else(|| anyhow::anyhow!("Subscription end date overflow"))?;

        let active = subscriptions::ActiveModel {
            id: NotSet,
            account_id: Set(account_id),
            tier: Set(tier.to_string()),
            status: Set(subscription_status::ACTIVE.to_string()),
            started_at: Set(now),
            ends_at: Set(ends_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active
            .insert(conn)
            .await
            .context("Failed to create subscription")?
    };

    Ok(Subscription::from(model))
}
