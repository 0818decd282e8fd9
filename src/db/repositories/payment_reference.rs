use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, NotSet, Set};

use crate::entities::payment_references;

pub struct PaymentReferenceRepository {
    conn: DatabaseConnection,
}

impl PaymentReferenceRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Atomic insert-if-absent on the unique reference column. Returns
    /// `true` when this call claimed the reference, `false` when an earlier
    /// delivery already did. This is the entire idempotency mechanism:
    /// claim first, mutate after.
    pub async fn try_claim(&self, reference: &str, account_id: i32, kind: &str) -> Result<bool> {
        let active = payment_references::ActiveModel {
            id: NotSet,
            reference: Set(reference.to_string()),
            account_id: Set(account_id),
            kind: Set(kind.to_string()),
            processed_at: Set(Utc::now()),
        };

        let inserted = payment_references::Entity::insert(active)
            .on_conflict(
                OnConflict::column(payment_references::Column::Reference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to claim payment reference")?;

        Ok(inserted > 0)
    }

    /// Drops a claim so a retried delivery can apply cleanly. Used when the
    /// mutation behind a claim failed.
    pub async fn release(&self, reference: &str) -> Result<()> {
        use sea_orm::{ColumnTrait, QueryFilter};

        payment_references::Entity::delete_many()
            .filter(payment_references::Column::Reference.eq(reference))
            .exec(&self.conn)
            .await
            .context("Failed to release payment reference")?;

        Ok(())
    }

}
