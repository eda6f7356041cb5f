pub mod admin;
pub mod auth;
pub mod bank_accounts;
pub mod oauth;
pub mod transactions;
