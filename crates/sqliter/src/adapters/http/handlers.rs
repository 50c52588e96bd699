use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    core::{
        connection::Database,
        types::{DatabaseInfo, SqlQueryResult, TableData},
    },
    error::{AppError, AppResult},
};

use super::protocol::*;

pub struct AppState {
    pub db: Database,
    pub max_rows: usize,
    pub allow_raw_where: bool,
}

type Shared = State<Arc<AppState>>;

pub async fn info(State(state): Shared) -> Json<DatabaseInfo> {
    Json(state.db.info())
}

pub async fn list_tables(State(state): Shared) -> AppResult<Json<TablesResponse>> {
    let tables = state.db.tables().await?;
    Ok(Json(TablesResponse { tables }))
}

pub async fn table_schema(
    State(state): Shared,
    Path(table): Path<String>,
) -> AppResult<Json<SchemaResponse>> {
    let table = table_name(table)?;
    let columns = state.db.schema(table).await?;
    Ok(Json(SchemaResponse { columns }))
}

pub async fn table_data(
    State(state): Shared,
    Path(table): Path<String>,
    Query(params): Query<TableDataParams>,
) -> AppResult<Json<TableData>> {
    let table = table_name(table)?;
    let q = params.into_query(Some(state.max_rows), state.allow_raw_where)?;
    let data = state.db.table_data(table, q).await?;
    Ok(Json(data))
}

pub async fn export_csv(
    State(state): Shared,
    Path(table): Path<String>,
    Query(params): Query<TableDataParams>,
) -> AppResult<Response> {
    let table = table_name(table)?;
    let q = params.into_query(None, state.allow_raw_where)?;
    let disposition = format!("attachment; filename=\"{}_export.csv\"", file_stem(&table));
    let body = state.db.export_csv(table, q).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn insert_row(
    State(state): Shared,
    Path(table): Path<String>,
    body: Result<Json<InsertRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let table = table_name(table)?;
    let req = json_body(body)?;
    state.db.insert(table, req.data).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("row inserted successfully")),
    ))
}

pub async fn update_row(
    State(state): Shared,
    Path(table): Path<String>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let table = table_name(table)?;
    let req = json_body(body)?;
    let res = state.db.update(table, req.data, req.conditions).await?;
    Ok(Json(MessageResponse::with_rows(
        "row updated successfully",
        res.rows_affected,
    )))
}

pub async fn delete_row(
    State(state): Shared,
    Path(table): Path<String>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let table = table_name(table)?;
    let req = json_body(body)?;
    let res = state.db.delete(table, req.conditions).await?;
    Ok(Json(MessageResponse::with_rows(
        "row deleted successfully",
        res.rows_affected,
    )))
}

pub async fn bulk_update(
    State(state): Shared,
    Path(table): Path<String>,
    body: Result<Json<BulkUpdateRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let table = table_name(table)?;
    let req = json_body(body)?;
    let n = req.targets.len();
    let res = state.db.bulk_update(table, req.data, req.targets).await?;
    Ok(Json(MessageResponse::with_rows(
        format!("{n} rows updated successfully"),
        res.rows_affected,
    )))
}

pub async fn bulk_delete(
    State(state): Shared,
    Path(table): Path<String>,
    body: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let table = table_name(table)?;
    let req = json_body(body)?;
    let n = req.targets.len();
    let res = state.db.bulk_delete(table, req.targets).await?;
    Ok(Json(MessageResponse::with_rows(
        format!("{n} rows deleted successfully"),
        res.rows_affected,
    )))
}

pub async fn execute_sql(
    State(state): Shared,
    body: Result<Json<ExecuteSqlRequest>, JsonRejection>,
) -> AppResult<Json<SqlQueryResult>> {
    let req = json_body(body)?;
    if req.sql.trim().is_empty() {
        return Err(AppError::EmptyInput("SQL query cannot be empty"));
    }
    let result = state.db.execute_sql(req.sql).await?;
    Ok(Json(result))
}

pub async fn api_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

fn table_name(table: String) -> AppResult<String> {
    if table.trim().is_empty() {
        return Err(AppError::InvalidRequest("table name is required".into()));
    }
    Ok(table)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(v)| v)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// Table names may hold anything SQLite accepts; keep the download name header-safe.
fn file_stem(table: &str) -> String {
    table
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_is_header_safe() {
        assert_eq!(file_stem("users"), "users");
        assert_eq!(file_stem("odd \"name\"\r\n"), "odd__name___");
    }

    #[test]
    fn blank_table_names_are_rejected() {
        assert!(table_name("  ".into()).is_err());
        assert_eq!(table_name("users".into()).unwrap(), "users");
    }
}
