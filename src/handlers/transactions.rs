//! Transaction endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::TallyError;
use crate::middleware::auth::CurrentUser;
use crate::router::TallyState;
use crate::service::transactions::TransactionService;
use crate::types::api::{
    TransactionCreateRequest, TransactionListQuery, TransactionListResponse, TransactionResponse,
    TransactionUpdateRequest, validate_page,
};

pub async fn create(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TransactionCreateRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), TallyError> {
    let tx = TransactionService::new(state.db.clone())
        .create(user.id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(tx.into())))
}

pub async fn list(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, TallyError> {
    validate_page(query.skip, query.limit)?;
    let (txs, total) = TransactionService::new(state.db.clone())
        .list(user.id, query.bank_account_id, query.skip, query.limit)
        .await?;
    Ok(Json(TransactionListResponse {
        items: txs.into_iter().map(Into::into).collect(),
        total,
    }))
}

pub async fn get(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, TallyError> {
    let tx = TransactionService::new(state.db.clone())
        .get(user.id, transaction_id)
        .await?
        .ok_or(TallyError::NotFound("Transaction"))?;
    Ok(Json(tx.into()))
}

pub async fn update(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<TransactionUpdateRequest>,
) -> Result<Json<TransactionResponse>, TallyError> {
    let tx = TransactionService::new(state.db.clone())
        .update(user.id, transaction_id, req)
        .await?
        .ok_or(TallyError::NotFound("Transaction"))?;
    Ok(Json(tx.into()))
}

pub async fn delete(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, TallyError> {
    let deleted = TransactionService::new(state.db.clone())
        .delete(user.id, transaction_id)
        .await?;
    if !deleted {
        return Err(TallyError::NotFound("Transaction"));
    }
    Ok(StatusCode::NO_CONTENT)
}
