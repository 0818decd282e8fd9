pub mod prelude;

pub mod accounts;
pub mod creatives;
pub mod payment_references;
pub mod subscriptions;
pub mod tickets;
