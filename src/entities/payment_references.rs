use sea_orm::entity::prelude::*;

/// Ledger of processor references that have already been applied.
/// The unique column is what makes webhook replays harmless: the
/// reconciler inserts here before mutating anything else.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_references")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub reference: String,

    pub account_id: i32,

    /// "topup" or "subscription"
    pub kind: String,

    pub processed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
