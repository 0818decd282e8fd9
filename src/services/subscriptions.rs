//! Subscription lifecycle queries and the daily expiry sweep.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::db::{Store, Subscription};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("No subscription for account")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for SubscriptionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    store: Store,
}

impl SubscriptionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn status(&self, account_id: i32) -> Result<Option<Subscription>, SubscriptionError> {
        Ok(self.store.get_subscription(account_id).await?)
    }

    pub async fn cancel(&self, account_id: i32) -> Result<(), SubscriptionError> {
        let removed = self.store.cancel_subscription(account_id).await?;
        if !removed {
            return Err(SubscriptionError::NotFound);
        }
        info!(account_id, "Subscription cancelled");
        Ok(())
    }

    /// Marks every active subscription whose end date has passed as expired.
    /// One bulk conditional UPDATE; rerunning immediately matches no rows.
    pub async fn expire_due(&self) -> Result<u64, SubscriptionError> {
        let expired = self.store.expire_due_subscriptions(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "Expired overdue subscriptions");
        }
        Ok(expired)
    }
}
