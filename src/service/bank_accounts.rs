//! Linked bank account lifecycle: CRUD, token refresh, and transaction sync.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::bank::{get_bank_api, minor_units_to_amount};
use crate::config::MonzoConfig;
use crate::crypto::FieldCipher;
use crate::db::Database;
use crate::db::models::{BankAccountRecord, TransactionRecord};
use crate::error::TallyError;
use crate::types::api::{BankAccountCreateRequest, BankAccountUpdateRequest};
use crate::types::domain::BankAccount;

const SYNC_PAGE_LIMIT: u32 = 100;

pub struct BankAccountService {
    db: Database,
    cipher: Arc<FieldCipher>,
    monzo: MonzoConfig,
}

impl BankAccountService {
    pub fn new(db: Database, cipher: Arc<FieldCipher>, monzo: MonzoConfig) -> Self {
        Self { db, cipher, monzo }
    }

    fn to_domain(&self, rec: BankAccountRecord) -> Result<BankAccount, TallyError> {
        Ok(BankAccount {
            id: rec.id,
            user_id: rec.user_id,
            account_type: rec.account_type,
            account_name: self.cipher.open_opt(rec.account_name_enc.as_deref())?,
            account_identifier: self.cipher.open_opt(rec.account_identifier_enc.as_deref())?,
            institution_name: rec.institution_name,
            token_expires_at: rec.token_expires_at,
            is_active: rec.is_active,
            created_at: rec.created_at,
        })
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        req: BankAccountCreateRequest,
    ) -> Result<BankAccount, TallyError> {
        if req.account_type.trim().is_empty() {
            return Err(TallyError::Validation(
                "account_type must not be empty".to_string(),
            ));
        }

        let rec = BankAccountRecord {
            id: Uuid::new_v4(),
            user_id,
            account_type: req.account_type,
            account_name_enc: self.cipher.seal_opt(req.account_name.as_deref())?,
            account_identifier_enc: self.cipher.seal_opt(req.account_identifier.as_deref())?,
            institution_name: req.institution_name,
            access_token_enc: Some(self.cipher.seal(&req.access_token)?),
            refresh_token_enc: self.cipher.seal_opt(req.refresh_token.as_deref())?,
            token_expires_at: req.token_expires_at,
            created_at: req.created_at.unwrap_or_else(Utc::now),
            is_active: true,
        };
        self.db.insert_bank_account(&rec).await?;
        info!(user_id = %user_id, account_id = %rec.id, "bank account linked");
        self.to_domain(rec)
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<BankAccount>, TallyError> {
        let rec = self.db.bank_account_by_id(user_id, account_id).await?;
        rec.map(|r| self.to_domain(r)).transpose()
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        include_inactive: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<BankAccount>, i64), TallyError> {
        let (recs, total) = self
            .db
            .list_bank_accounts(user_id, include_inactive, skip, limit)
            .await?;
        let accounts = recs
            .into_iter()
            .map(|r| self.to_domain(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((accounts, total))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        req: BankAccountUpdateRequest,
    ) -> Result<Option<BankAccount>, TallyError> {
        let Some(mut rec) = self.db.bank_account_by_id(user_id, account_id).await? else {
            return Ok(None);
        };

        if let Some(name) = req.account_name {
            rec.account_name_enc = Some(self.cipher.seal(&name)?);
        }
        if let Some(institution) = req.institution_name {
            rec.institution_name = Some(institution);
        }
        if let Some(token) = req.access_token {
            rec.access_token_enc = Some(self.cipher.seal(&token)?);
        }
        if let Some(token) = req.refresh_token {
            rec.refresh_token_enc = Some(self.cipher.seal(&token)?);
        }
        if let Some(expires) = req.token_expires_at {
            rec.token_expires_at = Some(expires);
        }
        if let Some(active) = req.is_active {
            rec.is_active = active;
        }

        self.db.update_bank_account(&rec).await?;
        Ok(Some(self.to_domain(rec)?))
    }

    /// Soft delete. The row and its transactions stay in place for history.
    pub async fn deactivate(&self, user_id: Uuid, account_id: Uuid) -> Result<bool, TallyError> {
        let deactivated = self.db.deactivate_bank_account(user_id, account_id).await?;
        if deactivated {
            info!(user_id = %user_id, account_id = %account_id, "bank account deactivated");
        }
        Ok(deactivated)
    }

    pub async fn refresh_token(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<BankAccount, TallyError> {
        let mut rec = self
            .db
            .bank_account_by_id(user_id, account_id)
            .await?
            .ok_or(TallyError::NotFound("Bank account"))?;

        let refresh_enc = rec.refresh_token_enc.as_deref().ok_or_else(|| {
            TallyError::TokenRefresh("bank account has no refresh token".to_string())
        })?;
        let refresh = self.cipher.open(refresh_enc)?;

        let api = get_bank_api(&rec.account_type, &self.monzo)?;
        let grant = api
            .refresh_token(&refresh)
            .await
            .inspect_err(|e| error!(account_id = %account_id, error = %e, "token refresh failed"))?;

        rec.access_token_enc = Some(self.cipher.seal(&grant.access_token)?);
        if let Some(new_refresh) = &grant.refresh_token {
            rec.refresh_token_enc = Some(self.cipher.seal(new_refresh)?);
        }
        rec.token_expires_at = Some(grant.expires_at);
        self.db.update_bank_account(&rec).await?;

        info!(account_id = %account_id, "access token refreshed");
        self.to_domain(rec)
    }

    /// Pull new transactions from the provider, starting after the newest
    /// stored transaction for this account. Returns how many were inserted.
    pub async fn sync_transactions(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<usize, TallyError> {
        let rec = self
            .db
            .bank_account_by_id(user_id, account_id)
            .await?
            .ok_or(TallyError::NotFound("Bank account"))?;

        let access_enc = rec.access_token_enc.as_deref().ok_or_else(|| {
            TallyError::Validation("bank account has no stored access token".to_string())
        })?;
        let access = self.cipher.open(access_enc)?;
        let identifier_enc = rec.account_identifier_enc.as_deref().ok_or_else(|| {
            TallyError::Validation("bank account has no provider identifier".to_string())
        })?;
        let identifier = self.cipher.open(identifier_enc)?;

        let api = get_bank_api(&rec.account_type, &self.monzo)?;
        let since = self.db.latest_transaction_time(account_id).await?;
        let fetched = api
            .get_transactions(&access, &identifier, since, SYNC_PAGE_LIMIT)
            .await?;

        let records: Vec<TransactionRecord> = fetched
            .into_iter()
            .map(|t| TransactionRecord {
                id: Uuid::new_v4(),
                user_id: rec.user_id,
                bank_account_id: rec.id,
                amount: minor_units_to_amount(t.amount),
                description: t.description,
                created_at: t.created,
            })
            .collect();

        if !records.is_empty() {
            self.db.insert_transactions(&records).await?;
        }
        info!(account_id = %account_id, count = records.len(), "transactions synced");
        Ok(records.len())
    }
}
