use rusqlite::{params_from_iter, types::Value, Connection};

use crate::core::constraint;
use crate::core::filter::compile_equalities;
use crate::core::schema::{quote_ident, require_column, resolve_table, table_schema};
use crate::core::types::{ColumnInfo, MutationResult};
use crate::core::value::json_to_sql;
use crate::error::{AppError, AppResult};

pub type Fields = serde_json::Map<String, serde_json::Value>;

pub fn insert(conn: &Connection, table: &str, data: &Fields) -> AppResult<MutationResult> {
    if data.is_empty() {
        return Err(AppError::EmptyInput("no data provided"));
    }
    let (table, columns) = resolve(conn, table)?;

    let mut names = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());
    for (name, value) in data {
        let col = require_column(&columns, &table, name)?;
        names.push(quote_ident(&col.name));
        values.push(json_to_sql(value));
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(&table),
        names.join(", ")
    );
    run(conn, &sql, &values)
}

pub fn update(
    conn: &Connection,
    table: &str,
    data: &Fields,
    conditions: &Fields,
) -> AppResult<MutationResult> {
    check_update_input(data, conditions)?;
    let (table, columns) = resolve(conn, table)?;
    update_resolved(conn, &table, &columns, data, conditions)
}

pub fn delete(conn: &Connection, table: &str, conditions: &Fields) -> AppResult<MutationResult> {
    if conditions.is_empty() {
        return Err(AppError::EmptyInput("no where clause provided"));
    }
    let (table, columns) = resolve(conn, table)?;
    delete_resolved(conn, &table, &columns, conditions)
}

/// Applies the same change to every targeted row inside one transaction.
pub fn bulk_update(
    conn: &mut Connection,
    table: &str,
    data: &Fields,
    targets: &[Fields],
) -> AppResult<MutationResult> {
    if targets.is_empty() {
        return Err(AppError::EmptyInput("no rows targeted"));
    }
    for conditions in targets {
        check_update_input(data, conditions)?;
    }
    let (table, columns) = resolve(conn, table)?;

    let tx = conn.transaction()?;
    let mut total = 0;
    for conditions in targets {
        total += update_resolved(&tx, &table, &columns, data, conditions)?.rows_affected;
    }
    tx.commit()?;
    tracing::info!(table = %table, rows = targets.len(), affected = total, "bulk update committed");
    Ok(MutationResult {
        rows_affected: total,
    })
}

/// Deletes every targeted row inside one transaction.
pub fn bulk_delete(
    conn: &mut Connection,
    table: &str,
    targets: &[Fields],
) -> AppResult<MutationResult> {
    if targets.is_empty() {
        return Err(AppError::EmptyInput("no rows targeted"));
    }
    if targets.iter().any(|t| t.is_empty()) {
        return Err(AppError::EmptyInput("no where clause provided"));
    }
    let (table, columns) = resolve(conn, table)?;

    let tx = conn.transaction()?;
    let mut total = 0;
    for conditions in targets {
        total += delete_resolved(&tx, &table, &columns, conditions)?.rows_affected;
    }
    tx.commit()?;
    tracing::info!(table = %table, rows = targets.len(), affected = total, "bulk delete committed");
    Ok(MutationResult {
        rows_affected: total,
    })
}

fn check_update_input(data: &Fields, conditions: &Fields) -> AppResult<()> {
    if data.is_empty() {
        return Err(AppError::EmptyInput("no data provided"));
    }
    if conditions.is_empty() {
        return Err(AppError::EmptyInput("no where clause provided"));
    }
    Ok(())
}

fn resolve(conn: &Connection, table: &str) -> AppResult<(String, Vec<ColumnInfo>)> {
    let table = resolve_table(conn, table)?;
    let columns = table_schema(conn, &table)?;
    Ok((table, columns))
}

fn update_resolved(
    conn: &Connection,
    table: &str,
    columns: &[ColumnInfo],
    data: &Fields,
    conditions: &Fields,
) -> AppResult<MutationResult> {
    let mut sets = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len() + conditions.len());
    for (name, value) in data {
        let col = require_column(columns, table, name)?;
        sets.push(format!("{} = ?", quote_ident(&col.name)));
        values.push(json_to_sql(value));
    }
    let filter = compile_equalities(table, columns, conditions)?;
    values.extend(filter.params);

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        sets.join(", "),
        filter.sql
    );
    run(conn, &sql, &values)
}

fn delete_resolved(
    conn: &Connection,
    table: &str,
    columns: &[ColumnInfo],
    conditions: &Fields,
) -> AppResult<MutationResult> {
    let filter = compile_equalities(table, columns, conditions)?;
    let sql = format!("DELETE FROM {} WHERE {}", quote_ident(table), filter.sql);
    run(conn, &sql, &filter.params)
}

fn run(conn: &Connection, sql: &str, values: &[Value]) -> AppResult<MutationResult> {
    tracing::debug!(sql = %sql, params = values.len(), "executing write");
    let changes = conn
        .execute(sql, params_from_iter(values.iter()))
        .map_err(|e| constraint::translate(e, AppError::SqlError))?;
    Ok(MutationResult {
        rows_affected: changes as u64,
    })
}
