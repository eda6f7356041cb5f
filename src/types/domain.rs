//! Decrypted views of the stored entities, as the service layer hands them
//! to handlers. Secrets (password hash, bank tokens) never leave this layer
//! except where an operation explicitly needs them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub account_name: Option<String>,
    pub account_identifier: Option<String>,
    pub institution_name: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
