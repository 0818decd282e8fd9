pub mod account;
pub mod creative;
pub mod payment_reference;
pub mod subscription;
pub mod ticket;
