//! Transaction CRUD, always scoped to the owning user.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::db::models::TransactionRecord;
use crate::error::TallyError;
use crate::types::api::{TransactionCreateRequest, TransactionUpdateRequest};
use crate::types::domain::Transaction;

impl From<TransactionRecord> for Transaction {
    fn from(rec: TransactionRecord) -> Self {
        Self {
            id: rec.id,
            user_id: rec.user_id,
            bank_account_id: rec.bank_account_id,
            amount: rec.amount,
            description: rec.description,
            created_at: rec.created_at,
        }
    }
}

pub struct TransactionService {
    db: Database,
}

impl TransactionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        req: TransactionCreateRequest,
    ) -> Result<Transaction, TallyError> {
        // The target account must belong to the caller and still be active.
        let account = self
            .db
            .bank_account_by_id(user_id, req.bank_account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(TallyError::NotFound("Bank account"))?;

        let rec = TransactionRecord {
            id: Uuid::new_v4(),
            user_id,
            bank_account_id: account.id,
            amount: req.amount,
            description: req.description,
            created_at: Utc::now(),
        };
        self.db.insert_transaction(&rec).await?;
        Ok(rec.into())
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, TallyError> {
        let rec = self.db.transaction_by_id(user_id, transaction_id).await?;
        Ok(rec.map(Transaction::from))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        bank_account_id: Option<Uuid>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Transaction>, i64), TallyError> {
        let (recs, total) = self
            .db
            .list_transactions(user_id, bank_account_id, skip, limit)
            .await?;
        Ok((recs.into_iter().map(Transaction::from).collect(), total))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        req: TransactionUpdateRequest,
    ) -> Result<Option<Transaction>, TallyError> {
        let Some(mut rec) = self.db.transaction_by_id(user_id, transaction_id).await? else {
            return Ok(None);
        };

        if let Some(amount) = req.amount {
            rec.amount = amount;
        }
        if let Some(description) = req.description {
            rec.description = Some(description);
        }

        self.db.update_transaction(&rec).await?;
        Ok(Some(rec.into()))
    }

    pub async fn delete(&self, user_id: Uuid, transaction_id: Uuid) -> Result<bool, TallyError> {
        self.db.delete_transaction(user_id, transaction_id).await
    }
}
