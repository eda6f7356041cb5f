pub mod models;
pub mod reset;
pub mod schema;

pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{BankAccountRecord, TransactionRecord, UserRecord};
use crate::db::postgres::PgStore;
use crate::db::sqlite::SqliteStore;
use crate::error::TallyError;

/// Storage contract, one implementation per supported engine. The engine is
/// picked once at connect time from the database URL scheme; everything
/// downstream is dialect-agnostic.
#[async_trait]
pub trait Store: Send + Sync {
    /// Execute the bundled DDL statement-by-statement.
    async fn init_schema(&self) -> Result<(), TallyError>;

    // users
    async fn insert_user(&self, user: &UserRecord) -> Result<(), TallyError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, TallyError>;
    async fn user_by_email(&self, email_enc: &str) -> Result<Option<UserRecord>, TallyError>;
    /// Delete a user and everything they own (transactions, bank accounts)
    /// in one transaction. Returns false when the user does not exist.
    async fn delete_user(&self, id: Uuid) -> Result<bool, TallyError>;

    // bank accounts
    async fn insert_bank_account(&self, rec: &BankAccountRecord) -> Result<(), TallyError>;
    async fn bank_account_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BankAccountRecord>, TallyError>;
    async fn list_bank_accounts(
        &self,
        user_id: Uuid,
        include_inactive: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<BankAccountRecord>, i64), TallyError>;
    /// Persist the mutable columns of an owned account.
    async fn update_bank_account(&self, rec: &BankAccountRecord) -> Result<bool, TallyError>;
    async fn deactivate_bank_account(&self, user_id: Uuid, id: Uuid) -> Result<bool, TallyError>;

    // transactions
    async fn insert_transaction(&self, rec: &TransactionRecord) -> Result<(), TallyError>;
    /// Bulk insert inside one transaction (used by provider sync).
    async fn insert_transactions(&self, recs: &[TransactionRecord]) -> Result<(), TallyError>;
    async fn transaction_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TransactionRecord>, TallyError>;
    async fn list_transactions(
        &self,
        user_id: Uuid,
        bank_account_id: Option<Uuid>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<TransactionRecord>, i64), TallyError>;
    async fn update_transaction(&self, rec: &TransactionRecord) -> Result<bool, TallyError>;
    async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<bool, TallyError>;
    /// Timestamp of the most recent transaction for an account, for
    /// incremental provider sync.
    async fn latest_transaction_time(
        &self,
        bank_account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, TallyError>;

    /// Development/test-only: empty every table except the preserved set,
    /// resetting auto-increment state where it exists. Atomic per engine.
    async fn reset_all_except(&self, preserved: &[&str]) -> Result<(), TallyError>;
}

pub type Database = Arc<dyn Store>;

/// Open a pool for the engine named by the URL scheme. Anything other than
/// SQLite or PostgreSQL is a configuration error, raised before any
/// connection attempt.
pub async fn connect(database_url: &str) -> Result<Database, TallyError> {
    if database_url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteStore::connect(database_url).await?))
    } else if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
        Ok(Arc::new(PgStore::connect(database_url).await?))
    } else {
        Err(TallyError::Configuration(format!(
            "unsupported database URL scheme: {database_url}"
        )))
    }
}
