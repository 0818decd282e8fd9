pub use super::accounts::Entity as Accounts;
pub use super::creatives::Entity as Creatives;
pub use super::payment_references::Entity as PaymentReferences;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::tickets::Entity as Tickets;
