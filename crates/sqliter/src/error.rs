use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    EmptyInput(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("invalid sort column: {0}")]
    InvalidSortColumn(String),

    /// Constraint violation, already translated into a user-facing message.
    #[error("{0}")]
    Constraint(String),

    /// Failure of client-supplied SQL on the execute endpoint.
    #[error("{0}")]
    QueryFailed(String),

    #[error("database is busy: {0}")]
    Busy(String),

    #[error("failed to open database: {path}: {source}")]
    DbOpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("sql error: {0}")]
    SqlError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        if is_busy(&e) {
            return AppError::Busy(e.to_string());
        }
        AppError::SqlError(e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Internal(format!("csv: {e}"))
    }
}

pub(crate) fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::EmptyInput(_) => "EMPTY_INPUT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TableNotFound(_) => "TABLE_NOT_FOUND",
            AppError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            AppError::InvalidSortColumn(_) => "INVALID_SORT_COLUMN",
            AppError::Constraint(_) => "CONSTRAINT_VIOLATION",
            AppError::QueryFailed(_) => "QUERY_FAILED",
            AppError::Busy(_) => "DATABASE_BUSY",
            AppError::DbOpenFailed { .. } => "DB_OPEN_FAILED",
            AppError::SchemaError(_) => "SCHEMA_ERROR",
            AppError::SqlError(_) => "SQL_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
