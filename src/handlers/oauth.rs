//! Monzo OAuth linking flow.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use tracing::info;

use crate::bank::get_bank_api;
use crate::error::TallyError;
use crate::middleware::auth::CurrentUser;
use crate::router::TallyState;
use crate::service::bank_accounts::BankAccountService;
use crate::types::api::{
    AuthUrlResponse, BankAccountCreateRequest, LinkedAccountSummary, OAuthCallbackQuery,
    OAuthCallbackResponse,
};

const PROVIDER: &str = "monzo";

/// Build the provider authorization URL the frontend should redirect to.
pub async fn monzo_auth_url(
    State(state): State<TallyState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<AuthUrlResponse>, TallyError> {
    let cfg = &state.config.monzo;
    let mut url = cfg.auth_base.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &cfg.client_id)
        .append_pair("redirect_uri", &cfg.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", PROVIDER);
    Ok(Json(AuthUrlResponse {
        auth_url: url.to_string(),
    }))
}

/// Exchange the authorization code, enumerate the provider's accounts, and
/// link each one to the caller.
pub async fn callback(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<OAuthCallbackResponse>, TallyError> {
    if query.state != PROVIDER {
        return Err(TallyError::Validation(
            "invalid state parameter".to_string(),
        ));
    }

    let api = get_bank_api(PROVIDER, &state.config.monzo)?;
    let grant = api.exchange_code(&query.code).await?;
    let provider_accounts = api.get_accounts(&grant.access_token).await?;
    if provider_accounts.is_empty() {
        return Err(TallyError::Upstream {
            status: StatusCode::BAD_REQUEST,
            detail: "no accounts found at provider".to_string(),
        });
    }

    let accounts = BankAccountService::new(
        state.db.clone(),
        state.cipher.clone(),
        state.config.monzo.clone(),
    );

    let mut linked = Vec::with_capacity(provider_accounts.len());
    for provider_account in provider_accounts {
        let name = provider_account
            .description
            .unwrap_or_else(|| "Monzo Account".to_string());
        let account = accounts
            .create(
                user.id,
                BankAccountCreateRequest {
                    account_type: PROVIDER.to_string(),
                    account_name: Some(name.clone()),
                    account_identifier: Some(provider_account.id),
                    institution_name: Some("Monzo".to_string()),
                    access_token: grant.access_token.clone(),
                    refresh_token: grant.refresh_token.clone(),
                    token_expires_at: Some(grant.expires_at),
                    created_at: provider_account.created,
                },
            )
            .await?;
        linked.push(LinkedAccountSummary {
            id: account.id,
            name,
        });
    }

    info!(user_id = %user.id, count = linked.len(), "linked accounts via oauth callback");
    Ok(Json(OAuthCallbackResponse {
        status: "success".to_string(),
        accounts: linked,
    }))
}
