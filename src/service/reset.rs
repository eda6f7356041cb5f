//! Development-only database reset.

use tracing::{info, warn};

use crate::config::Environment;
use crate::db::Database;
use crate::error::TallyError;

/// Tables whose rows survive a reset.
const PRESERVED_TABLES: &[&str] = &["users"];

pub struct ResetService {
    db: Database,
    environment: Environment,
}

impl ResetService {
    pub fn new(db: Database, environment: Environment) -> Self {
        Self { db, environment }
    }

    /// Clear every application table except the preserved ones. Refused
    /// outside development and test environments.
    pub async fn reset(&self) -> Result<(), TallyError> {
        if !self.environment.allows_reset() {
            warn!(environment = ?self.environment, "database reset refused");
            return Err(TallyError::Configuration(
                "database reset is only allowed in development or test environments".to_string(),
            ));
        }

        self.db.reset_all_except(PRESERVED_TABLES).await?;
        info!("database reset complete");
        Ok(())
    }
}
