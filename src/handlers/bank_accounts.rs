//! Bank account endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::TallyError;
use crate::middleware::auth::CurrentUser;
use crate::router::TallyState;
use crate::service::bank_accounts::BankAccountService;
use crate::types::api::{
    BankAccountCreateRequest, BankAccountListQuery, BankAccountListResponse, BankAccountResponse,
    BankAccountUpdateRequest, SyncResponse, validate_page,
};

fn service(state: &TallyState) -> BankAccountService {
    BankAccountService::new(
        state.db.clone(),
        state.cipher.clone(),
        state.config.monzo.clone(),
    )
}

pub async fn create(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<BankAccountCreateRequest>,
) -> Result<(StatusCode, Json<BankAccountResponse>), TallyError> {
    let account = service(&state).create(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

pub async fn list(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<BankAccountListQuery>,
) -> Result<Json<BankAccountListResponse>, TallyError> {
    validate_page(query.skip, query.limit)?;
    let (accounts, total) = service(&state)
        .list(user.id, query.include_inactive, query.skip, query.limit)
        .await?;
    Ok(Json(BankAccountListResponse {
        items: accounts.into_iter().map(Into::into).collect(),
        total,
    }))
}

pub async fn get(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> Result<Json<BankAccountResponse>, TallyError> {
    let account = service(&state)
        .get(user.id, account_id)
        .await?
        .ok_or(TallyError::NotFound("Bank account"))?;
    Ok(Json(account.into()))
}

pub async fn update(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(account_id): Path<Uuid>,
    Json(req): Json<BankAccountUpdateRequest>,
) -> Result<Json<BankAccountResponse>, TallyError> {
    let account = service(&state)
        .update(user.id, account_id, req)
        .await?
        .ok_or(TallyError::NotFound("Bank account"))?;
    Ok(Json(account.into()))
}

/// Soft delete: the account is marked inactive, its transactions remain.
pub async fn deactivate(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, TallyError> {
    let deactivated = service(&state).deactivate(user.id, account_id).await?;
    if !deactivated {
        return Err(TallyError::NotFound("Bank account"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn refresh(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> Result<Json<BankAccountResponse>, TallyError> {
    let account = service(&state).refresh_token(user.id, account_id).await?;
    Ok(Json(account.into()))
}

pub async fn sync(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(account_id): Path<Uuid>,
) -> Result<Json<SyncResponse>, TallyError> {
    let synced = service(&state).sync_transactions(user.id, account_id).await?;
    Ok(Json(SyncResponse { synced }))
}
