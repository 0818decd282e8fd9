use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
    TransactionTrait,
};

use crate::entities::creatives;

pub struct CreativeRepository {
    conn: DatabaseConnection,
}

impl CreativeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_blocks(&self, account_id: i32) -> Result<Option<serde_json::Value>> {
        let creative = creatives::Entity::find()
            .filter(creatives::Column::AccountId.eq(account_id))
            .one(&self.conn)
            .await
            .context("Failed to query creatives")?;

        Ok(creative.map(|c| c.blocks))
    }

    /// Append blocks to the account's creative document, creating it on
    /// first save. Read-modify-write inside a transaction so concurrent
    /// saves don't drop each other's blocks.
    pub async fn append_blocks(
        &self,
        account_id: i32,
        new_blocks: Vec<serde_json::Value>,
    ) -> Result<usize> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to begin creatives transaction")?;

        let now = Utc::now();
        let existing = creatives::Entity::find()
            .filter(creatives::Column::AccountId.eq(account_id))
            .one(&txn)
            .await
            .context("Failed to query creatives for append")?;

        let total = if let Some(current) = existing {
            let mut blocks = match current.blocks.clone() {
                serde_json::Value::Array(items) => items,
                _ => Vec::new(),
            };
            blocks.extend(new_blocks);
            let total = blocks.len();

            let mut active: creatives::ActiveModel = current.into();
            active.blocks = Set(serde_json::Value::Array(blocks));
            active.updated_at = Set(now);
            active
                .update(&txn)
                .await
                .context("Failed to update creatives")?;
            total
        } else {
            let total = new_blocks.len();
            let active = creatives::ActiveModel {
                id: NotSet,
                account_id: Set(account_id),
                blocks: Set(serde_json::Value::Array(new_blocks)),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active
                .insert(&txn)
                .await
                .context("Failed to insert creatives")?;
            total
        };

        txn.commit()
            .await
            .context("Failed to commit creatives transaction")?;

        Ok(total)
    }

    /// Remove the document, returning its blocks so the caller can cascade
    /// stored objects.
    pub async fn delete_by_account(&self, account_id: i32) -> Result<Option<serde_json::Value>> {
        let existing = creatives::Entity::find()
            .filter(creatives::Column::AccountId.eq(account_id))
            .one(&self.conn)
            .await
            .context("Failed to query creatives for deletion")?;

        let Some(current) = existing else {
            return Ok(None);
        };

        let blocks = current.blocks.clone();
        creatives::Entity::delete_by_id(current.id)
            .exec(&self.conn)
            .await
            .context("Failed to delete creatives")?;

        Ok(Some(blocks))
    }
}
