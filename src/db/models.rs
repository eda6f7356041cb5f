//! Stored record types plus the tuple-row parsing shared by both store
//! implementations. Encrypted columns stay opaque (`*_enc`) here; the
//! service layer owns the cipher.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::TallyError;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email_enc: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankAccountRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_type: String,
    pub account_name_enc: Option<String>,
    pub account_identifier_enc: Option<String>,
    pub institution_name: Option<String>,
    pub access_token_enc: Option<String>,
    pub refresh_token_enc: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Raw SELECT tuples, identical across dialects.
pub type UserRow = (String, String, String, String, String);
pub type BankAccountRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    bool,
);
pub type TransactionRow = (String, String, String, String, Option<String>, String);

fn decode_err<E>(e: E) -> TallyError
where
    E: std::error::Error + Send + Sync + 'static,
{
    TallyError::Database(sqlx::Error::Decode(Box::new(e)))
}

pub fn parse_uuid(s: &str) -> Result<Uuid, TallyError> {
    Uuid::parse_str(s).map_err(decode_err)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TallyError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(decode_err)
}

pub fn parse_decimal(s: &str) -> Result<Decimal, TallyError> {
    s.parse::<Decimal>().map_err(decode_err)
}

impl TryFrom<UserRow> for UserRecord {
    type Error = TallyError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let (id, email_enc, hashed_password, created_at, updated_at) = row;
        Ok(UserRecord {
            id: parse_uuid(&id)?,
            email_enc,
            hashed_password,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

impl TryFrom<BankAccountRow> for BankAccountRecord {
    type Error = TallyError;

    fn try_from(row: BankAccountRow) -> Result<Self, Self::Error> {
        let (
            id,
            user_id,
            account_type,
            account_name_enc,
            account_identifier_enc,
            institution_name,
            access_token_enc,
            refresh_token_enc,
            token_expires_at,
            created_at,
            is_active,
        ) = row;
        Ok(BankAccountRecord {
            id: parse_uuid(&id)?,
            user_id: parse_uuid(&user_id)?,
            account_type,
            account_name_enc,
            account_identifier_enc,
            institution_name,
            access_token_enc,
            refresh_token_enc,
            token_expires_at: token_expires_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&created_at)?,
            is_active,
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = TallyError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let (id, user_id, bank_account_id, amount, description, created_at) = row;
        Ok(TransactionRecord {
            id: parse_uuid(&id)?,
            user_id: parse_uuid(&user_id)?,
            bank_account_id: parse_uuid(&bank_account_id)?,
            amount: parse_decimal(&amount)?,
            description,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// RFC3339 with fixed UTC offset; stable lexicographic ordering is what the
/// `ORDER BY created_at` clauses rely on.
pub fn fmt_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
