pub mod bank_accounts;
pub mod reset;
pub mod transactions;
pub mod users;
