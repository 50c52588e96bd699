use rusqlite::{params_from_iter, types::Value, Batch, Connection, Row, Statement};

use crate::core::constraint;
use crate::core::filter::{self, WhereClause};
use crate::core::schema::{quote_ident, resolve_table, table_schema};
use crate::core::types::{ColumnInfo, DbRow, SqlQueryResult, TableData, TableQuery};
use crate::core::value::{sql_to_field, sql_to_json};
use crate::error::{AppError, AppResult};

/// A resolved read: validated identifiers and the compiled WHERE clause.
struct Plan {
    table: String,
    columns: Vec<ColumnInfo>,
    filter: WhereClause,
    order_by: String,
}

fn plan(conn: &Connection, table: &str, q: &TableQuery) -> AppResult<Plan> {
    let table = resolve_table(conn, table)?;
    let columns = table_schema(conn, &table)?;

    let order_by = match &q.sort {
        Some(sort) => {
            if !columns.iter().any(|c| c.name == sort.column) {
                return Err(AppError::InvalidSortColumn(sort.column.clone()));
            }
            format!(
                " ORDER BY {} {}",
                quote_ident(&sort.column),
                sort.direction.as_sql()
            )
        }
        None => String::new(),
    };

    let filter = filter::compile(&table, &columns, &q.filters, q.raw_where.as_deref())?;
    Ok(Plan {
        table,
        columns,
        filter,
        order_by,
    })
}

pub fn table_data(conn: &Connection, table: &str, q: &TableQuery) -> AppResult<TableData> {
    let plan = plan(conn, table, q)?;
    let from = format!("FROM {}{}", quote_ident(&plan.table), plan.filter.render());

    let count_sql = format!("SELECT COUNT(*) {from}");
    tracing::debug!(sql = %count_sql, "counting rows");
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(plan.filter.params.iter()),
        |r| r.get(0),
    )?;

    let mut params = plan.filter.params.clone();
    let sql = match q.limit {
        Some(limit) => {
            params.push(Value::Integer(to_i64(limit)));
            params.push(Value::Integer(to_i64(q.offset)));
            format!("SELECT * {from}{} LIMIT ? OFFSET ?", plan.order_by)
        }
        None => format!("SELECT * {from}{}", plan.order_by),
    };
    tracing::debug!(sql = %sql, "reading page");

    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::new();
    let mut r = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = r.next()? {
        rows.push(row_to_json_object(row, &names)?);
    }

    Ok(TableData {
        columns: plan.columns,
        rows,
        total: total.max(0) as u64,
    })
}

/// Every row matching the query (ignoring the page window), as CSV with a
/// header line.
pub fn export_csv(conn: &Connection, table: &str, q: &TableQuery) -> AppResult<Vec<u8>> {
    let plan = plan(conn, table, q)?;
    let sql = format!(
        "SELECT * FROM {}{}{}",
        quote_ident(&plan.table),
        plan.filter.render(),
        plan.order_by
    );
    tracing::debug!(sql = %sql, "exporting csv");

    let mut stmt = conn.prepare(&sql)?;
    let width = stmt.column_count();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(stmt.column_names())?;

    let mut r = stmt.query(params_from_iter(plan.filter.params.iter()))?;
    let mut record = Vec::with_capacity(width);
    while let Some(row) = r.next()? {
        record.clear();
        for i in 0..width {
            record.push(sql_to_field(row.get_ref(i)?));
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv: {}", e.error())))
}

/// Runs client-supplied SQL. A leading `SELECT` returns rows and must be the
/// only statement. Anything else runs as a script, statement by statement,
/// and reports how many rows the INSERT, UPDATE and DELETE statements changed.
/// Statements that already ran are not rolled back when a later one fails.
pub fn execute_sql(conn: &Connection, sql: &str) -> AppResult<SqlQueryResult> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(AppError::EmptyInput("SQL query cannot be empty"));
    }
    tracing::debug!(sql = %sql, "executing client sql");

    if leading_keyword(sql).eq_ignore_ascii_case("select") {
        return run_select(conn, sql);
    }
    let changes = run_script(conn, sql).map_err(failed)?;
    Ok(SqlQueryResult {
        columns: vec!["rows_affected".to_string()],
        rows: vec![vec![serde_json::Value::from(changes)]],
        row_count: 1,
        rows_affected: Some(changes),
    })
}

fn failed(e: rusqlite::Error) -> AppError {
    constraint::translate(e, AppError::QueryFailed)
}

fn leading_keyword(sql: &str) -> &str {
    let sql = sql.trim_start();
    let end = sql
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(sql.len());
    &sql[..end]
}

fn run_select(conn: &Connection, sql: &str) -> AppResult<SqlQueryResult> {
    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next().map_err(failed)? else {
        return Err(AppError::EmptyInput("SQL query cannot be empty"));
    };
    if batch.next().map_err(failed)?.is_some() {
        return Err(AppError::QueryFailed(
            "a SELECT must be the only statement in the request".into(),
        ));
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut r = stmt.query([]).map_err(failed)?;
    while let Some(row) = r.next().map_err(failed)? {
        let mut tuple = Vec::with_capacity(width);
        for i in 0..width {
            tuple.push(sql_to_json(row.get_ref(i).map_err(failed)?));
        }
        rows.push(tuple);
    }

    Ok(SqlQueryResult {
        row_count: rows.len(),
        columns,
        rows,
        rows_affected: None,
    })
}

/// Each statement is prepared only after the previous one finished, so a
/// script may use the tables it creates. Rows from PRAGMA, EXPLAIN or WITH
/// statements are stepped through and dropped.
fn run_script(conn: &Connection, sql: &str) -> rusqlite::Result<u64> {
    let mut batch = Batch::new(conn, sql);
    let mut changes = 0;
    while let Some(mut stmt) = batch.next()? {
        {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
        }
        if modifies_rows(&stmt) {
            changes += conn.changes();
        }
    }
    Ok(changes)
}

/// The engine's change counter only moves for INSERT, UPDATE and DELETE; for
/// any other statement it still holds the previous count.
fn modifies_rows(stmt: &Statement<'_>) -> bool {
    if stmt.readonly() {
        return false;
    }
    stmt.expanded_sql().is_some_and(|text| {
        let kw = leading_keyword(&text);
        ["insert", "replace", "update", "delete", "with"]
            .iter()
            .any(|dml| kw.eq_ignore_ascii_case(dml))
    })
}

fn row_to_json_object(row: &Row<'_>, col_names: &[String]) -> AppResult<DbRow> {
    let mut out = DbRow::with_capacity(col_names.len());
    for (i, name) in col_names.iter().enumerate() {
        out.insert(name.clone(), sql_to_json(row.get_ref(i)?));
    }
    Ok(out)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
