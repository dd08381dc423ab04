pub mod admin;
pub mod emails;
pub mod payments;
pub mod purchase;
pub mod webhooks;
