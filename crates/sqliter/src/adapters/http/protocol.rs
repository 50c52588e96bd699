use serde::{Deserialize, Serialize};

use crate::core::limits::effective_limit;
use crate::core::mutate::Fields;
use crate::core::types::{ColumnInfo, Filter, Sort, SortDirection, TableInfo, TableQuery};
use crate::error::{AppError, AppResult};

// Query strings

/// Raw query parameters for the data and export endpoints. Kept as strings so
/// malformed numbers produce our own error body instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TableDataParams {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<String>,
    /// JSON array of `{column, op, value}`.
    #[serde(default)]
    pub filters: Option<String>,
    #[serde(default)]
    pub where_clause: Option<String>,
}

impl TableDataParams {
    /// Validates everything that can be checked without the database.
    /// `max_rows` of `None` means no page window (CSV export).
    pub fn into_query(self, max_rows: Option<usize>, allow_raw_where: bool) -> AppResult<TableQuery> {
        let limit = match max_rows {
            Some(max_rows) => {
                let requested = parse_count(self.limit, "limit")?;
                Some(effective_limit(requested, max_rows).max_rows)
            }
            None => None,
        };
        let offset = match max_rows {
            Some(_) => parse_count(self.offset, "offset")?.unwrap_or(0),
            None => 0,
        };

        let direction = non_empty(self.sort_direction)
            .map(|d| d.parse::<SortDirection>())
            .transpose()?;
        let sort = non_empty(self.sort_column).map(|column| Sort {
            column,
            direction: direction.unwrap_or(SortDirection::Asc),
        });

        let filters = match non_empty(self.filters) {
            Some(raw) => serde_json::from_str::<Vec<Filter>>(&raw)
                .map_err(|e| AppError::InvalidRequest(format!("invalid filters parameter: {e}")))?,
            None => Vec::new(),
        };

        let raw_where = non_empty(self.where_clause);
        if raw_where.is_some() && !allow_raw_where {
            return Err(AppError::InvalidRequest(
                "where_clause is disabled on this server; use the filters parameter".into(),
            ));
        }

        Ok(TableQuery {
            limit,
            offset,
            sort,
            filters,
            raw_where,
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn parse_count(raw: Option<String>, name: &str) -> AppResult<Option<usize>> {
    non_empty(raw)
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| AppError::InvalidRequest(format!("invalid {name} parameter")))
        })
        .transpose()
}

// Bodies

#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    #[serde(default)]
    pub data: Fields,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub data: Fields,
    #[serde(default, rename = "where")]
    pub conditions: Fields,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default, rename = "where")]
    pub conditions: Fields,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    #[serde(default)]
    pub data: Fields,
    #[serde(default, rename = "where")]
    pub targets: Vec<Fields>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default, rename = "where")]
    pub targets: Vec<Fields>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlRequest {
    #[serde(default)]
    pub sql: String,
}

// Responses

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(rename = "rowsAffected", skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rows_affected: None,
        }
    }

    pub fn with_rows(message: impl Into<String>, rows_affected: u64) -> Self {
        Self {
            message: message.into(),
            rows_affected: Some(rows_affected),
        }
    }
}
