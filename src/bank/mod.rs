//! Bank provider clients. One provider today (Monzo); the factory keys on
//! the bank account's `account_type` so further providers slot in without
//! touching callers.

pub mod monzo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::MonzoConfig;
use crate::error::TallyError;
use monzo::MonzoClient;

/// Token pair handed back by a provider's token endpoint. `refresh_token`
/// is optional on refresh responses; callers keep the old one when absent.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Account record as the provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAccount {
    pub id: String,
    pub description: Option<String>,
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
}

/// Transaction record as the provider reports it. `amount` is in minor
/// currency units (pennies).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTransaction {
    pub id: String,
    pub amount: i64,
    pub created: DateTime<Utc>,
    pub description: Option<String>,
}

/// Capability interface shared by all bank providers.
#[async_trait]
pub trait BankApi: Send + Sync {
    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, auth_code: &str) -> Result<TokenGrant, TallyError>;

    /// Refresh an access token using the stored refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, TallyError>;

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<ProviderAccount>, TallyError>;

    /// Fetch transactions for one provider account, newest activity since
    /// `since` when given.
    async fn get_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ProviderTransaction>, TallyError>;
}

/// Select a provider implementation by account type.
pub fn get_bank_api(
    account_type: &str,
    cfg: &MonzoConfig,
) -> Result<Box<dyn BankApi>, TallyError> {
    match account_type.to_ascii_lowercase().as_str() {
        "monzo" => Ok(Box::new(MonzoClient::new(cfg)?)),
        other => Err(TallyError::Validation(format!(
            "unsupported bank API type: {other}"
        ))),
    }
}

/// Provider amounts are integers in minor units; the ledger stores decimal
/// major units. Integer-scaled decimal construction, so no float rounding.
pub fn minor_units_to_amount(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_convert_exactly() {
        assert_eq!(minor_units_to_amount(-500).to_string(), "-5.00");
        assert_eq!(minor_units_to_amount(1).to_string(), "0.01");
        assert_eq!(minor_units_to_amount(0).to_string(), "0.00");
        assert_eq!(minor_units_to_amount(123_456_789).to_string(), "1234567.89");
    }

    #[test]
    fn factory_is_case_insensitive() {
        let cfg = MonzoConfig::default();
        assert!(get_bank_api("Monzo", &cfg).is_ok());
        assert!(get_bank_api("monzo", &cfg).is_ok());
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let cfg = MonzoConfig::default();
        assert!(matches!(
            get_bank_api("starling", &cfg),
            Err(TallyError::Validation(_))
        ));
    }
}
