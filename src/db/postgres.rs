use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Acquire, Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use crate::db::Store;
use crate::db::models::{
    BankAccountRecord, BankAccountRow, TransactionRecord, TransactionRow, UserRecord, UserRow,
    fmt_timestamp, parse_timestamp,
};
use crate::db::schema::POSTGRES_INIT;
use crate::error::TallyError;

pub type PgPool = Pool<Postgres>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, TallyError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn init_schema(&self) -> Result<(), TallyError> {
        for stmt in POSTGRES_INIT.split(';') {
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
               VALUES ($1, $2, $3, $4, $5)"#,
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
            "SELECT id, email, hashed_password, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn user_by_email(&self, email_enc: &str) -> Result<Option<UserRecord>, TallyError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, hashed_password, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email_enc)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, TallyError> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM transactions WHERE user_id = $1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM bank_accounts WHERE user_id = $1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
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
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
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
               FROM bank_accounts WHERE id = $1 AND user_id = $2"#,
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
            "user_id = $1"
        } else {
            "user_id = $1 AND is_active = TRUE"
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
               ORDER BY created_at DESC LIMIT $2 OFFSET $3"#
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
                account_name = $1,
                account_identifier = $2,
                institution_name = $3,
                access_token = $4,
                refresh_token = $5,
                token_expires_at = $6,
                is_active = $7
              WHERE id = $8 AND user_id = $9"#,
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
        let res = sqlx::query(
            "UPDATE bank_accounts SET is_active = FALSE WHERE id = $1 AND user_id = $2",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_transaction(&self, rec: &TransactionRecord) -> Result<(), TallyError> {
        sqlx::query(
            r#"INSERT INTO transactions (id, user_id, bank_account_id, amount, description, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
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
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
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
               FROM transactions WHERE id = $1 AND user_id = $2"#,
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
                    "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND bank_account_id = $2",
                )
                .bind(&user_id)
                .bind(&account_id)
                .fetch_one(&self.pool)
                .await?;
                let rows = sqlx::query_as(
                    r#"SELECT id, user_id, bank_account_id, amount, description, created_at
                       FROM transactions WHERE user_id = $1 AND bank_account_id = $2
                       ORDER BY created_at DESC LIMIT $3 OFFSET $4"#,
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
                    sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
                        .bind(&user_id)
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query_as(
                    r#"SELECT id, user_id, bank_account_id, amount, description, created_at
                       FROM transactions WHERE user_id = $1
                       ORDER BY created_at DESC LIMIT $2 OFFSET $3"#,
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
            "UPDATE transactions SET amount = $1, description = $2 WHERE id = $3 AND user_id = $4",
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
        let res = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
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
            r#"SELECT created_at FROM transactions WHERE bank_account_id = $1
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(bank_account_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(ts,)| parse_timestamp(&ts)).transpose()
    }

    async fn reset_all_except(&self, preserved: &[&str]) -> Result<(), TallyError> {
        let mut conn = self.pool.acquire().await?;

        let names: Vec<(String,)> =
            sqlx::query_as("SELECT tablename FROM pg_tables WHERE schemaname = 'public'")
                .fetch_all(&mut *conn)
                .await?;
        let tables: Vec<String> = names
            .into_iter()
            .map(|(n,)| n)
            .filter(|n| !preserved.contains(&n.as_str()))
            .collect();
        if tables.is_empty() {
            return Ok(());
        }
        debug!(?tables, "resetting postgres tables");

        // Fresh transaction boundary; everything below is all-or-nothing.
        let mut tx = conn.begin().await?;
        let steps: Result<(), TallyError> = async {
            sqlx::query("SET session_replication_role = replica")
                .execute(&mut *tx)
                .await?;

            let joined = tables
                .iter()
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(", ");
            sqlx::query(&format!("TRUNCATE TABLE {joined} CASCADE"))
                .execute(&mut *tx)
                .await?;

            for table in &tables {
                // IF EXISTS keeps a missing sequence from aborting the
                // transaction; any other failure here is fatal.
                sqlx::query(&format!(
                    "ALTER SEQUENCE IF EXISTS \"{table}_id_seq\" RESTART WITH 1"
                ))
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("SET session_replication_role = DEFAULT")
                .execute(&mut *tx)
                .await?;
            Ok(())
        }
        .await;

        match steps {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await.ok();
                // Rollback reverts SET, but force the default role back in
                // case the connection is left in a dirty state.
                sqlx::query("SET session_replication_role = DEFAULT")
                    .execute(&mut *conn)
                    .await
                    .ok();
                Err(TallyError::Internal(format!("postgres reset failed: {e}")))
            }
        }
    }
}
