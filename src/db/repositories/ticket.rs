use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
};

use crate::entities::tickets;

#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: i32,
    pub account_id: i32,
    pub kind: String,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl From<tickets::Model> for Ticket {
    fn from(model: tickets::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            kind: model.kind,
            secret_hash: model.secret_hash,
            expires_at: model.expires_at,
        }
    }
}

pub struct TicketRepository {
    conn: DatabaseConnection,
}

impl TicketRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Replace any live ticket of this kind with a fresh one. Keeps the
    /// one-live-ticket-per-kind invariant without relying on the caller.
    pub async fn replace(
        &self,
        account_id: i32,
        kind: &str,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Ticket> {
        self.delete(account_id, kind).await?;

        let active = tickets::ActiveModel {
            id: NotSet,
            account_id: Set(account_id),
            kind: Set(kind.to_string()),
            secret_hash: Set(secret_hash),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert ticket")?;

        Ok(Ticket::from(model))
    }

    pub async fn find(&self, account_id: i32, kind: &str) -> Result<Option<Ticket>> {
        let ticket = tickets::Entity::find()
            .filter(tickets::Column::AccountId.eq(account_id))
            .filter(tickets::Column::Kind.eq(kind))
            .one(&self.conn)
            .await
            .context("Failed to query ticket")?;

        Ok(ticket.map(Ticket::from))
    }

    pub async fn delete(&self, account_id: i32, kind: &str) -> Result<u64> {
        let result = tickets::Entity::delete_many()
            .filter(tickets::Column::AccountId.eq(account_id))
            .filter(tickets::Column::Kind.eq(kind))
            .exec(&self.conn)
            .await
            .context("Failed to delete tickets")?;

        Ok(result.rows_affected)
    }

    pub async fn delete_all_for_account(&self, account_id: i32) -> Result<u64> {
        let result = tickets::Entity::delete_many()
            .filter(tickets::Column::AccountId.eq(account_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete account tickets")?;

        Ok(result.rows_affected)
    }
}
