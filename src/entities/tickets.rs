use sea_orm::entity::prelude::*;

/// One-time email tickets (verification links, password resets).
/// At most one live ticket per account and kind.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub account_id: i32,

    /// "verification" or "password_reset"
    pub kind: String,

    /// Argon2id hash of the emailed secret.
    pub secret_hash: String,

    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
