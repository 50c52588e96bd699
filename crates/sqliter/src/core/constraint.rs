use rusqlite::{ffi, ErrorCode};

use crate::error::{is_busy, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    Unique,
    NotNull,
    ForeignKey,
    Check,
    /// Any other constraint class (STRICT type mismatch, trigger `RAISE`).
    Other,
}

/// Maps an engine error from a write into an `AppError`. Constraint failures
/// become `Constraint` with a plain-language message; lock contention becomes
/// `Busy`; everything else goes through `fallback` with the engine text verbatim.
pub fn translate(e: rusqlite::Error, fallback: fn(String) -> AppError) -> AppError {
    if is_busy(&e) {
        return AppError::Busy(e.to_string());
    }
    let text = e.to_string();
    match classify(&e, &text) {
        Some(kind) => {
            let message = describe(kind, &text);
            tracing::warn!(engine = %text, "constraint violation");
            AppError::Constraint(message)
        }
        None => fallback(text),
    }
}

fn classify(e: &rusqlite::Error, text: &str) -> Option<Violation> {
    if let rusqlite::Error::SqliteFailure(err, _) = e {
        if err.code == ErrorCode::ConstraintViolation {
            let kind = match err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Violation::Unique)
                }
                ffi::SQLITE_CONSTRAINT_NOTNULL => Some(Violation::NotNull),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
                ffi::SQLITE_CONSTRAINT_CHECK => Some(Violation::Check),
                _ => None,
            };
            return kind
                .or_else(|| classify_text(text))
                .or(Some(Violation::Other));
        }
    }
    classify_text(text)
}

/// Only consulted when the extended result code gives no answer.
fn classify_text(text: &str) -> Option<Violation> {
    if text.contains("UNIQUE constraint failed") {
        Some(Violation::Unique)
    } else if text.contains("NOT NULL constraint failed") {
        Some(Violation::NotNull)
    } else if text.contains("FOREIGN KEY constraint failed") {
        Some(Violation::ForeignKey)
    } else if text.contains("CHECK constraint failed") {
        Some(Violation::Check)
    } else {
        None
    }
}

fn describe(kind: Violation, text: &str) -> String {
    match kind {
        Violation::Unique => match columns_after(text, "UNIQUE constraint failed: ") {
            Some(cols) => format!("The value for '{cols}' already exists. This field must be unique."),
            None => "A unique constraint was violated. This value already exists.".into(),
        },
        Violation::NotNull => match columns_after(text, "NOT NULL constraint failed: ") {
            Some(cols) => format!("The field '{cols}' is required and cannot be empty."),
            None => "A required field is missing.".into(),
        },
        Violation::ForeignKey => {
            "This operation violates a foreign key constraint. The referenced record may not exist."
                .into()
        }
        Violation::Check => match detail_after(text, "CHECK constraint failed: ") {
            Some(expr) => format!("The value violates a check constraint: {expr}"),
            None => "The value violates a check constraint.".into(),
        },
        Violation::Other => text.to_string(),
    }
}

fn detail_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let (_, rest) = text.split_once(marker)?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/// `users.email` -> `email`; `t.a, t.b` -> `a, b`.
fn columns_after(text: &str, marker: &str) -> Option<String> {
    let rest = detail_after(text, marker)?;
    let cols: Vec<&str> = rest
        .split(", ")
        .map(|qualified| qualified.rsplit_once('.').map_or(qualified, |(_, c)| c))
        .collect();
    Some(cols.join(", "))
}
