use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use ledger_core::LedgerError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error")]
    Internal,
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let msg = e.to_string();
        match e {
            LedgerError::NotFound(_) | LedgerError::SeriesNotFound(_) | LedgerError::UnknownRequest(_) => {
                ApiError::NotFound(msg)
            }
            LedgerError::AlreadyRevealed(_)
            | LedgerError::AlreadySettled(_)
            | LedgerError::RevealInFlight(_)
            | LedgerError::DuplicateRequestId(_)
            | LedgerError::CallbackMismatch(_) => ApiError::Conflict(msg),
            LedgerError::InvalidProof(_) => ApiError::Unauthorized(msg),
            LedgerError::MalformedPayload(_) | LedgerError::UninitializedHandle(_) => ApiError::BadRequest(msg),
            LedgerError::Oracle(_) => ApiError::BadGateway(msg),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            ApiError::Config(_) | ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
