//! Monzo API client: OAuth code exchange, token refresh, and resource
//! fetches over bearer-authenticated HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;
use url::Url;

use crate::bank::{BankApi, ProviderAccount, ProviderTransaction, TokenGrant};
use crate::config::MonzoConfig;
use crate::error::TallyError;

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AccountsEnvelope {
    accounts: Vec<ProviderAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    transactions: Vec<ProviderTransaction>,
}

pub struct MonzoClient {
    http: reqwest::Client,
    api_base: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl MonzoClient {
    pub fn new(cfg: &MonzoConfig) -> Result<Self, TallyError> {
        let http = reqwest::Client::builder()
            .user_agent("tally-bank/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: cfg.api_base.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
        })
    }

    /// One token-endpoint grant request; both exchange and refresh funnel
    /// through here. Any failure surfaces as `TokenRefresh` with the
    /// provider's own error text.
    async fn token_request(
        &self,
        context: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, TallyError> {
        let url = self.api_base.join("/oauth2/token")?;
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| TallyError::TokenRefresh(format!("{context}: {e}")))?;

        if response.status() != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(TallyError::TokenRefresh(format!("{context}: {text}")));
        }

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| TallyError::TokenRefresh(format!("{context}: {e}")))?;

        Ok(TokenGrant {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }

    /// Bearer-authenticated GET against a resource endpoint. 401 maps to
    /// the token-refresh-required error, other non-200s pass the provider
    /// status through, transport failures are service-unavailable.
    async fn get_resource<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(String, String)],
    ) -> Result<T, TallyError> {
        let url = self.api_base.join(path)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                TallyError::BankUnavailable(format!("failed to communicate with Monzo: {e}"))
            })?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| TallyError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                detail: format!("malformed Monzo response: {e}"),
            }),
            StatusCode::UNAUTHORIZED => {
                Err(TallyError::TokenRefresh("access token expired".to_string()))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(TallyError::Upstream {
                    status,
                    detail: format!("Monzo API error: {text}"),
                })
            }
        }
    }
}

#[async_trait]
impl BankApi for MonzoClient {
    async fn exchange_code(&self, auth_code: &str) -> Result<TokenGrant, TallyError> {
        let grant = self
            .token_request(
                "code exchange failed",
                &[
                    ("grant_type", "authorization_code"),
                    ("client_id", &self.client_id),
                    ("client_secret", &self.client_secret),
                    ("redirect_uri", &self.redirect_uri),
                    ("code", auth_code),
                ],
            )
            .await?;
        info!("Monzo authorization code exchanged");
        Ok(grant)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, TallyError> {
        let grant = self
            .token_request(
                "token refresh failed",
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", &self.client_id),
                    ("client_secret", &self.client_secret),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;
        info!("Monzo access token refreshed");
        Ok(grant)
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<ProviderAccount>, TallyError> {
        let envelope: AccountsEnvelope = self.get_resource("/accounts", access_token, &[]).await?;
        Ok(envelope.accounts)
    }

    async fn get_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ProviderTransaction>, TallyError> {
        let mut query = vec![
            ("account_id".to_string(), account_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(since) = since {
            query.push((
                "since".to_string(),
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        let envelope: TransactionsEnvelope = self
            .get_resource("/transactions", access_token, &query)
            .await?;
        Ok(envelope.transactions)
    }
}
