//! HTTP error responses for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::{ErrorKind, FolioError};

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &FolioError) -> StatusCode {
    match err {
        FolioError::MissingIdentity => StatusCode::UNAUTHORIZED,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<FolioError> for WebError {
    fn from(err: FolioError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            // Storage details stay in the log.
            return Self::internal("internal server error");
        }
        tracing::debug!(status = status.as_u16(), error = %err, "request rejected");
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            status_from_error(&FolioError::validation("symbol", "required")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_from_error(&FolioError::MissingIdentity),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_from_error(&FolioError::Unauthorized {
                user_id: 1,
                portfolio_id: 2
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_from_error(&FolioError::PortfolioNotFound { portfolio_id: 2 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_from_error(&FolioError::InsufficientFunds {
                required: Decimal::ONE,
                available: Decimal::ZERO
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_from_error(&FolioError::InsufficientHistory {
                symbol: "ABC".into(),
                points: 1,
                minimum: 2
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_from_error(&FolioError::Database {
                reason: "down".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn infrastructure_details_are_hidden() {
        let web: WebError = FolioError::DatabaseQuery {
            reason: "syntax error near SELECT".into(),
        }
        .into();
        assert_eq!(web.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(web.message, "internal server error");
    }
}
