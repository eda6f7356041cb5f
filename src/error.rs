use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum TallyError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("could not validate credentials: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("bank API error ({status}): {detail}")]
    Upstream { status: StatusCode, detail: String },

    #[error("failed to communicate with bank provider: {0}")]
    BankUnavailable(String),

    #[error("operation not allowed in this environment: {0}")]
    Configuration(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("database error: {0}")]
    Database(#[from] SqlxError),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for TallyError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            TallyError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "VALIDATION".to_string(),
                    message: msg,
                },
            ),
            TallyError::EmailTaken => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "EMAIL_TAKEN".to_string(),
                    message: "Email already registered.".to_string(),
                },
            ),
            TallyError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Incorrect email or password.".to_string(),
                },
            ),
            TallyError::Unauthorized(_) | TallyError::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Could not validate credentials.".to_string(),
                },
            ),
            TallyError::NotFound(entity) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{entity} not found."),
                },
            ),
            TallyError::TokenRefresh(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "TOKEN_REFRESH_FAILED".to_string(),
                    message: msg,
                },
            ),
            TallyError::Upstream { status, detail } => (
                status,
                ApiErrorBody {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: detail,
                },
            ),
            TallyError::BankUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorBody {
                    code: "BANK_UNAVAILABLE".to_string(),
                    message: msg,
                },
            ),
            TallyError::Configuration(msg) => (
                StatusCode::FORBIDDEN,
                ApiErrorBody {
                    code: "FORBIDDEN".to_string(),
                    message: msg,
                },
            ),
            TallyError::Reqwest(_) | TallyError::UrlParse(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                },
            ),
            err @ (TallyError::Database(_)
            | TallyError::Json(_)
            | TallyError::Crypto(_)
            | TallyError::Internal(_)) => {
                // Original cause stays in the log; the caller only sees an opaque 500.
                error!(error = %err, "internal error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred.".to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
