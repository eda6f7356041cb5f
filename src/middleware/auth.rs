//! Bearer-token authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::TallyError;
use crate::router::TallyState;
use crate::security::decode_access_token;
use crate::service::users::UserService;
use crate::types::domain::User;

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header before any handler logic runs.
pub struct CurrentUser(pub User);

impl FromRequestParts<TallyState> for CurrentUser {
    type Rejection = TallyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &TallyState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    TallyError::Unauthorized("missing or malformed bearer token".to_string())
                })?;

        let user_id = decode_access_token(bearer.token(), &state.config.secret_key)?;

        let users = UserService::new(state.db.clone(), state.cipher.clone());
        let user = users
            .get(user_id)
            .await?
            .ok_or_else(|| TallyError::Unauthorized("user no longer exists".to_string()))?;

        Ok(CurrentUser(user))
    }
}
