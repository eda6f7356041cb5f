//! Request/response shapes for the REST surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TallyError;
use crate::types::domain::{BankAccount, Transaction, User};

// ---- auth ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Form-encoded login body, OAuth2 password-grant style: the email travels
/// in `username`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

// ---- pagination ----

fn default_limit() -> i64 {
    100
}

// Pagination fields live inline on each query struct; serde_urlencoded
// cannot flatten non-string fields.
pub fn validate_page(skip: i64, limit: i64) -> Result<(), TallyError> {
    if skip < 0 {
        return Err(TallyError::Validation("skip must be >= 0".to_string()));
    }
    if !(1..=100).contains(&limit) {
        return Err(TallyError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    Ok(())
}

// ---- bank accounts ----

#[derive(Debug, Deserialize)]
pub struct BankAccountCreateRequest {
    pub account_type: String,
    pub account_name: Option<String>,
    pub account_identifier: Option<String>,
    pub institution_name: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Provider-reported creation time; now if absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update; absent fields are left as-is.
#[derive(Debug, Default, Deserialize)]
pub struct BankAccountUpdateRequest {
    pub account_name: Option<String>,
    pub institution_name: Option<String>,
    pub is_active: Option<bool>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BankAccountListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BankAccountResponse {
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

impl From<BankAccount> for BankAccountResponse {
    fn from(a: BankAccount) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            account_type: a.account_type,
            account_name: a.account_name,
            account_identifier: a.account_identifier,
            institution_name: a.institution_name,
            token_expires_at: a.token_expires_at,
            created_at: a.created_at,
            is_active: a.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BankAccountListResponse {
    pub items: Vec<BankAccountResponse>,
    pub total: i64,
}

// ---- transactions ----

#[derive(Debug, Deserialize)]
pub struct TransactionCreateRequest {
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Partial update; absent fields are left as-is.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionUpdateRequest {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub bank_account_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            bank_account_id: t.bank_account_id,
            amount: t.amount,
            description: t.description,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionListResponse {
    pub items: Vec<TransactionResponse>,
    pub total: i64,
}

// ---- oauth / admin ----

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkedAccountSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthCallbackResponse {
    pub status: String,
    pub accounts: Vec<LinkedAccountSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub synced: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
