//! Development-only administrative endpoints.

use axum::Json;
use axum::extract::State;

use crate::error::TallyError;
use crate::router::TallyState;
use crate::service::reset::ResetService;
use crate::types::api::MessageResponse;

pub async fn reset_database(
    State(state): State<TallyState>,
) -> Result<Json<MessageResponse>, TallyError> {
    ResetService::new(state.db.clone(), state.config.environment)
        .reset()
        .await?;
    Ok(Json(MessageResponse {
        message: "Database reset successful".to_string(),
    }))
}
