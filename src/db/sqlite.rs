use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Acquire, Pool, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use crate::db::Store;
use crate::db::models::{
    BankAccountRecord, BankAccountRow, TransactionRecord, TransactionRow, UserRecord, UserRow,
    fmt_timestamp, parse_timestamp,
};
use crate::db::reset::dependency_order;
use crate::db::schema::SQLITE_INIT;
use crate::error::TallyError;

pub type SqlitePool = Pool<Sqlite>;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, TallyError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init_schema(&self) -> Result<(), TallyError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), TallyError> {
        sqlx::query(
            r#"INSERT INTO users (id, email, hashed_password, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.email_enc)
        .bind(&user.hashed_password)
        .bind(fmt_timestamp(&user.created_at))
        .bind(fmt_timestamp(&user.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, TallyError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, hashed_password, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn user_by_email(&self, email_enc: &str) -> Result<Option<UserRecord>, TallyError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, hashed_password, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email_enc)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, TallyError> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM transactions WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM bank_accounts WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_bank_account(&self, rec: &BankAccountRecord) -> Result<(), TallyError> {
        sqlx::query(
            r#"INSERT INTO bank_accounts (
                id, user_id, account_type, account_name, account_identifier,
                institution_name, access_token, refresh_token, token_expires_at,
                created_at, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(rec.id.to_string())
        .bind(rec.user_id.to_string())
        .bind(&rec.account_type)
        .bind(&rec.account_name_enc)
        .bind(&rec.account_identifier_enc)
        .bind(&rec.institution_name)
        .bind(&rec.access_token_enc)
        .bind(&rec.refresh_token_enc)
        .bind(rec.token_expires_at.as_ref().map(fmt_timestamp))
        .bind(fmt_timestamp(&rec.created_at))
        .bind(rec.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bank_account_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BankAccountRecord>, TallyError> {
        let row: Option<BankAccountRow> = sqlx::query_as(
            r#"SELECT id, user_id, account_type, account_name, account_identifier,
                      institution_name, access_token, refresh_token, token_expires_at,
                      created_at, is_active
               FROM bank_accounts WHERE id = ? AND user_id = ?"#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(BankAccountRecord::try_from).transpose()
    }

    async fn list_bank_accounts(
        &self,
        user_id: Uuid,
        include_inactive: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<BankAccountRecord>, i64), TallyError> {
        let user_id = user_id.to_string();
        let filter = if include_inactive {
            "user_id = ?"
        } else {
            "user_id = ? AND is_active = 1"
        };

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bank_accounts WHERE {filter}"))
                .bind(&user_id)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<BankAccountRow> = sqlx::query_as(&format!(
            r#"SELECT id, user_id, account_type, account_name, account_identifier,
                      institution_name, access_token, refresh_token, token_expires_at,
                      created_at, is_active
               FROM bank_accounts WHERE {filter}
               ORDER BY created_at DESC LIMIT ? OFFSET ?"#
        ))
        .bind(&user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(BankAccountRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn update_bank_account(&self, rec: &BankAccountRecord) -> Result<bool, TallyError> {
        let res = sqlx::query(
            r#"UPDATE bank_accounts SET
                account_name = ?,
                account_identifier = ?,
                institution_name = ?,
                access_token = ?,
                refresh_token = ?,
                token_expires_at = ?,
                is_active = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&rec.account_name_enc)
        .bind(&rec.account_identifier_enc)
        .bind(&rec.institution_name)
        .bind(&rec.access_token_enc)
        .bind(&rec.refresh_token_enc)
        .bind(rec.token_expires_at.as_ref().map(fmt_timestamp))
        .bind(rec.is_active)
        .bind(rec.id.to_string())
        .bind(rec.user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn deactivate_bank_account(&self, user_id: Uuid, id: Uuid) -> Result<bool, TallyError> {
        let res = sqlx::query("UPDATE bank_accounts SET is_active = 0 WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_transaction(&self, rec: &TransactionRecord) -> Result<(), TallyError> {
        sqlx::query(
            r#"INSERT INTO transactions (id, user_id, bank_account_id, amount, description, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(rec.id.to_string())
        .bind(rec.user_id.to_string())
        .bind(rec.bank_account_id.to_string())
        .bind(rec.amount.to_string())
        .bind(&rec.description)
        .bind(fmt_timestamp(&rec.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_transactions(&self, recs: &[TransactionRecord]) -> Result<(), TallyError> {
        let mut tx = self.pool.begin().await?;
        for rec in recs {
            sqlx::query(
                r#"INSERT INTO transactions (id, user_id, bank_account_id, amount, description, created_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(rec.id.to_string())
            .bind(rec.user_id.to_string())
            .bind(rec.bank_account_id.to_string())
            .bind(rec.amount.to_string())
            .bind(&rec.description)
            .bind(fmt_timestamp(&rec.created_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn transaction_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TransactionRecord>, TallyError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"SELECT id, user_id, bank_account_id, amount, description, created_at
               FROM transactions WHERE id = ? AND user_id = ?"#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TransactionRecord::try_from).transpose()
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        bank_account_id: Option<Uuid>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<TransactionRecord>, i64), TallyError> {
        let user_id = user_id.to_string();

        let (total, rows): (i64, Vec<TransactionRow>) = match bank_account_id {
            Some(account_id) => {
                let account_id = account_id.to_string();
                let total = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM transactions WHERE user_id = ? AND bank_account_id = ?",
                )
                .bind(&user_id)
                .bind(&account_id)
                .fetch_one(&self.pool)
                .await?;
                let rows = sqlx::query_as(
                    r#"SELECT id, user_id, bank_account_id, amount, description, created_at
                       FROM transactions WHERE user_id = ? AND bank_account_id = ?
                       ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                )
                .bind(&user_id)
                .bind(&account_id)
                .bind(limit)
                .bind(skip)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total =
                    sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = ?")
                        .bind(&user_id)
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query_as(
                    r#"SELECT id, user_id, bank_account_id, amount, description, created_at
                       FROM transactions WHERE user_id = ?
                       ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                )
                .bind(&user_id)
                .bind(limit)
                .bind(skip)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let items = rows
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn update_transaction(&self, rec: &TransactionRecord) -> Result<bool, TallyError> {
        let res = sqlx::query(
            "UPDATE transactions SET amount = ?, description = ? WHERE id = ? AND user_id = ?",
        )
        .bind(rec.amount.to_string())
        .bind(&rec.description)
        .bind(rec.id.to_string())
        .bind(rec.user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<bool, TallyError> {
        let res = sqlx::query("DELETE FROM transactions WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn latest_transaction_time(
        &self,
        bank_account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, TallyError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"SELECT created_at FROM transactions WHERE bank_account_id = ?
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(bank_account_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(ts,)| parse_timestamp(&ts)).transpose()
    }

    async fn reset_all_except(&self, preserved: &[&str]) -> Result<(), TallyError> {
        let mut conn = self.pool.acquire().await?;

        // Discover the live schema; never hardcode beyond the preserved set.
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&mut *conn)
        .await?;
        let tables: Vec<String> = names
            .into_iter()
            .map(|(n,)| n)
            .filter(|n| !preserved.contains(&n.as_str()))
            .collect();

        let mut edges: Vec<(String, String)> = Vec::new();
        for table in &tables {
            let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list(\"{table}\")"))
                .fetch_all(&mut *conn)
                .await?;
            for row in fk_rows {
                let parent: String = row.try_get("table")?;
                edges.push((table.clone(), parent));
            }
        }
        let order = dependency_order(&tables, &edges);
        debug!(?order, "resetting sqlite tables");

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;

        let mut tx = conn.begin().await?;
        let steps: Result<(), TallyError> = async {
            for table in &order {
                sqlx::query(&format!("DELETE FROM \"{table}\""))
                    .execute(&mut *tx)
                    .await?;
                // sqlite_sequence only exists once an AUTOINCREMENT column
                // does; a missing table is not an error.
                let _ = sqlx::query("DELETE FROM sqlite_sequence WHERE name = ?")
                    .bind(table)
                    .execute(&mut *tx)
                    .await;
            }
            Ok(())
        }
        .await;

        let outcome = match steps {
            Ok(()) => match sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *tx).await {
                Ok(_) => {
                    tx.commit().await?;
                    Ok(())
                }
                Err(e) => {
                    tx.rollback().await.ok();
                    Err(TallyError::Internal(format!("failed to reset database: {e}")))
                }
            },
            Err(e) => {
                tx.rollback().await.ok();
                Err(TallyError::Internal(format!("failed to reset database: {e}")))
            }
        };

        // The pragma is ignored while a transaction is open, so restore
        // enforcement for real now that the transaction has ended.
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await
            .ok();

        outcome
    }
}
