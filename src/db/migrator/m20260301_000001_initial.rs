use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::entities::{accounts, creatives, payment_references, subscriptions, tickets};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(schema.create_table_from_entity(accounts::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(tickets::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(subscriptions::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(payment_references::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(creatives::Entity))
            .await?;

        // One live ticket per (account, kind); replacement deletes then inserts.
        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_account_kind")
                    .table(tickets::Entity)
                    .col(tickets::Column::AccountId)
                    .col(tickets::Column::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_status_ends_at")
                    .table(subscriptions::Entity)
                    .col(subscriptions::Column::Status)
                    .col(subscriptions::Column::EndsAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(creatives::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(payment_references::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(subscriptions::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(tickets::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(accounts::Entity).to_owned())
            .await?;
        Ok(())
    }
}
