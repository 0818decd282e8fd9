use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    pub nickname: String,

    /// Argon2id password hash. Absent for accounts created via an
    /// external identity provider.
    pub password_hash: Option<String>,

    /// "local" or "google"
    pub provider: String,

    pub google_id: Option<String>,

    /// "user" or "admin"
    pub role: String,

    pub verified: bool,

    pub token_balance: i64,

    /// Anchor of the current monthly allowance period. Advanced by whole
    /// calendar months, never set to "now".
    pub tokens_reset_at: DateTimeUtc,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
