//! User registration, authentication, and cascade deletion.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::crypto::FieldCipher;
use crate::db::Database;
use crate::db::models::UserRecord;
use crate::error::TallyError;
use crate::security::{hash_password, verify_password};
use crate::types::domain::User;

pub struct UserService {
    db: Database,
    cipher: Arc<FieldCipher>,
}

impl UserService {
    pub fn new(db: Database, cipher: Arc<FieldCipher>) -> Self {
        Self { db, cipher }
    }

    fn to_domain(&self, rec: UserRecord) -> Result<User, TallyError> {
        Ok(User {
            id: rec.id,
            email: self.cipher.open(&rec.email_enc)?,
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<User, TallyError> {
        if !email.contains('@') {
            return Err(TallyError::Validation("invalid email address".to_string()));
        }
        if password.is_empty() {
            return Err(TallyError::Validation("password must not be empty".to_string()));
        }

        // Deterministic encryption keeps lookup and the UNIQUE constraint working.
        let email_enc = self.cipher.seal_deterministic(email)?;
        if self.db.user_by_email(&email_enc).await?.is_some() {
            return Err(TallyError::EmailTaken);
        }

        let now = Utc::now();
        let rec = UserRecord {
            id: Uuid::new_v4(),
            email_enc,
            hashed_password: hash_password(password)?,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_user(&rec).await?;
        info!(user_id = %rec.id, "user registered");

        Ok(User {
            id: rec.id,
            email: email.to_string(),
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    /// `None` on unknown email or password mismatch; the caller maps both
    /// to the same credential error so the two cases are indistinguishable.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, TallyError> {
        let email_enc = self.cipher.seal_deterministic(email)?;
        let Some(rec) = self.db.user_by_email(&email_enc).await? else {
            return Ok(None);
        };
        if !verify_password(password, &rec.hashed_password) {
            return Ok(None);
        }
        Ok(Some(self.to_domain(rec)?))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<User>, TallyError> {
        let rec = self.db.user_by_id(user_id).await?;
        rec.map(|r| self.to_domain(r)).transpose()
    }

    /// Hard delete a user and all associated data (transactions, bank
    /// accounts, then the user row) in one transaction.
    pub async fn delete(&self, user_id: Uuid) -> Result<bool, TallyError> {
        let deleted = self.db.delete_user(user_id).await?;
        if deleted {
            info!(user_id = %user_id, "user deleted with all associated data");
        }
        Ok(deleted)
    }
}
