use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::AppError;

impl AppError {
    /// Client-caused failures are 4xx; engine and server faults are 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::EmptyInput(_)
            | AppError::UnknownColumn { .. }
            | AppError::InvalidSortColumn(_)
            | AppError::Constraint(_)
            | AppError::QueryFailed(_) => StatusCode::BAD_REQUEST,

            AppError::NotFound(_) | AppError::TableNotFound(_) => StatusCode::NOT_FOUND,

            AppError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,

            AppError::DbOpenFailed { .. }
            | AppError::SchemaError(_)
            | AppError::SqlError(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::InvalidSortColumn("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Constraint("dup".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::TableNotFound("t".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Busy("locked".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::SqlError("disk I/O error".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn busy_engine_errors_are_classified() {
        let e = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        let app: AppError = e.into();
        assert_eq!(app.code(), "DATABASE_BUSY");
        assert_eq!(app.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
