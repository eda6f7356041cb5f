//! Registration, login, and current-user endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::error::TallyError;
use crate::middleware::auth::CurrentUser;
use crate::router::TallyState;
use crate::security::create_access_token;
use crate::service::users::UserService;
use crate::types::api::{LoginForm, RegisterRequest, TokenResponse, UserResponse};

pub async fn register(
    State(state): State<TallyState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), TallyError> {
    let users = UserService::new(state.db.clone(), state.cipher.clone());
    let user = users.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Form-encoded login in the OAuth2 password-grant shape: `username` holds
/// the email. Unknown email and wrong password produce the same error.
pub async fn login(
    State(state): State<TallyState>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Result<Json<TokenResponse>, TallyError> {
    let users = UserService::new(state.db.clone(), state.cipher.clone());
    let user = users
        .authenticate(&form.username, &form.password)
        .await?
        .ok_or(TallyError::InvalidCredentials)?;

    let token = create_access_token(
        user.id,
        &state.config.secret_key,
        state.config.access_token_expire_minutes,
    )?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

pub async fn delete_me(
    State(state): State<TallyState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, TallyError> {
    let users = UserService::new(state.db.clone(), state.cipher.clone());
    users.delete(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
