//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stakeline_ledger::LedgerError;
use thiserror::Error;

/// Error returned by API handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Request body or path could not be parsed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Blocking task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Ledger(err) => match err {
                LedgerError::InvalidAmount(_)
                | LedgerError::InvalidInput(_)
                | LedgerError::NotMatured { .. } => StatusCode::BAD_REQUEST,
                LedgerError::AccountNotFound(_) | LedgerError::PositionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LedgerError::Forbidden { .. } => StatusCode::FORBIDDEN,
                LedgerError::AlreadyUnlocked(_) | LedgerError::DuplicateTransaction(_) => {
                    StatusCode::CONFLICT
                }
                LedgerError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.code(),
            Self::BadRequest(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        match &self {
            Self::Ledger(LedgerError::NotMatured {
                days_remaining,
                unlock_date,
                ..
            }) => {
                body["days_remaining"] = json!(days_remaining);
                body["unlock_date"] = json!(unlock_date);
            }
            Self::Ledger(LedgerError::AlreadyUnlocked(receipt)) => {
                body["receipt"] = json!(receipt);
            }
            Self::Ledger(LedgerError::Storage(err)) => {
                tracing::error!(error = %err, "Storage failure");
                body["error"] = json!("storage temporarily unavailable");
            }
            Self::Internal(msg) => tracing::error!(error = %msg, "Request failed"),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeline_core::PositionId;
    use stakeline_storage::StoreError;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(LedgerError::PositionNotFound(PositionId(1)));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.code(), "not_found");

        let storage = ApiError::from(LedgerError::Storage(StoreError::Unavailable("x".into())));
        assert_eq!(storage.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad = ApiError::BadRequest("missing field".into());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
