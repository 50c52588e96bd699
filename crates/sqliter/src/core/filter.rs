use rusqlite::types::Value;

use crate::core::schema::{quote_ident, require_column};
use crate::core::types::{ColumnInfo, Filter, FilterOp};
use crate::core::value::json_to_sql;
use crate::error::{AppError, AppResult};

/// A compiled WHERE clause: SQL text (without the keyword) plus its bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// ` WHERE ...` or nothing.
    pub fn render(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }
}

/// Compiles structured filters (ANDed) against the resolved columns. A raw
/// fragment, when present, is ANDed in parenthesized.
pub fn compile(
    table: &str,
    columns: &[ColumnInfo],
    filters: &[Filter],
    raw_where: Option<&str>,
) -> AppResult<WhereClause> {
    let mut parts = Vec::with_capacity(filters.len() + 1);
    let mut params = Vec::new();

    for f in filters {
        let col = require_column(columns, table, &f.column)?;
        let ident = quote_ident(&col.name);
        let part = match f.op {
            FilterOp::IsNull => format!("{ident} IS NULL"),
            FilterOp::IsNotNull => format!("{ident} IS NOT NULL"),
            FilterOp::Eq if operand(f)?.is_null() => format!("{ident} IS NULL"),
            FilterOp::Ne if operand(f)?.is_null() => format!("{ident} IS NOT NULL"),
            FilterOp::Eq => compare(&mut params, f, &ident, "=")?,
            FilterOp::Ne => compare(&mut params, f, &ident, "!=")?,
            FilterOp::Gt => compare(&mut params, f, &ident, ">")?,
            FilterOp::Gte => compare(&mut params, f, &ident, ">=")?,
            FilterOp::Lt => compare(&mut params, f, &ident, "<")?,
            FilterOp::Lte => compare(&mut params, f, &ident, "<=")?,
            FilterOp::Contains => like(&mut params, &ident, format!("%{}%", like_needle(f)?)),
            FilterOp::StartsWith => like(&mut params, &ident, format!("{}%", like_needle(f)?)),
            FilterOp::EndsWith => like(&mut params, &ident, format!("%{}", like_needle(f)?)),
        };
        parts.push(part);
    }

    if let Some(raw) = raw_where.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("({raw})"));
    }

    Ok(WhereClause {
        sql: parts.join(" AND "),
        params,
    })
}

/// Equality conditions for UPDATE/DELETE targeting. `null` compiles to `IS NULL`.
pub fn compile_equalities(
    table: &str,
    columns: &[ColumnInfo],
    conditions: &serde_json::Map<String, serde_json::Value>,
) -> AppResult<WhereClause> {
    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());
    for (name, value) in conditions {
        let col = require_column(columns, table, name)?;
        let ident = quote_ident(&col.name);
        if value.is_null() {
            parts.push(format!("{ident} IS NULL"));
        } else {
            parts.push(format!("{ident} = ?"));
            params.push(json_to_sql(value));
        }
    }
    Ok(WhereClause {
        sql: parts.join(" AND "),
        params,
    })
}

fn compare(params: &mut Vec<Value>, f: &Filter, ident: &str, op: &str) -> AppResult<String> {
    let value = operand(f)?;
    if value.is_null() {
        return Err(AppError::InvalidRequest(format!(
            "filter on '{}' cannot compare against null",
            f.column
        )));
    }
    params.push(json_to_sql(value));
    Ok(format!("{ident} {op} ?"))
}

fn like(params: &mut Vec<Value>, ident: &str, pattern: String) -> String {
    params.push(Value::Text(pattern));
    format!("{ident} LIKE ? ESCAPE '\\'")
}

fn like_needle(f: &Filter) -> AppResult<String> {
    Ok(escape_like(&text_operand(f)?))
}

fn operand(f: &Filter) -> AppResult<&serde_json::Value> {
    f.value.as_ref().ok_or_else(|| {
        AppError::InvalidRequest(format!("filter on '{}' requires a value", f.column))
    })
}

fn text_operand(f: &Filter) -> AppResult<String> {
    match operand(f)? {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::InvalidRequest(format!(
            "filter on '{}' requires a text value",
            f.column
        ))),
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn columns() -> Vec<ColumnInfo> {
        ["id", "name", "age"]
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnInfo {
                cid: i as i64,
                name: n.to_string(),
                decl_type: String::new(),
                not_null: false,
                default_value: None,
                primary_key: i == 0,
                unique: false,
            })
            .collect()
    }

    fn filter(column: &str, op: FilterOp, value: Option<serde_json::Value>) -> Filter {
        Filter {
            column: column.into(),
            op,
            value,
        }
    }

    #[test]
    fn empty_filters_render_nothing() {
        let w = compile("users", &columns(), &[], None).unwrap();
        assert!(w.is_empty());
        assert_eq!(w.render(), "");
    }

    #[test]
    fn comparisons_are_bound() {
        let w = compile(
            "users",
            &columns(),
            &[
                filter("age", FilterOp::Gte, Some(json!(21))),
                filter("name", FilterOp::Eq, Some(json!("O'Brien"))),
                filter("id", FilterOp::IsNotNull, None),
            ],
            None,
        )
        .unwrap();
        assert_eq!(
            w.sql,
            "\"age\" >= ? AND \"name\" = ? AND \"id\" IS NOT NULL"
        );
        assert_eq!(
            w.params,
            vec![Value::Integer(21), Value::Text("O'Brien".into())]
        );
    }

    #[test]
    fn like_operands_are_escaped() {
        let w = compile(
            "users",
            &columns(),
            &[filter("name", FilterOp::Contains, Some(json!("50%_off")))],
            None,
        )
        .unwrap();
        assert_eq!(w.sql, "\"name\" LIKE ? ESCAPE '\\'");
        assert_eq!(w.params, vec![Value::Text("%50\\%\\_off%".into())]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let err = compile(
            "users",
            &columns(),
            &[filter("name\" OR 1=1 --", FilterOp::Eq, Some(json!(1)))],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::UnknownColumn { .. }));
    }

    #[test]
    fn missing_operand_is_rejected() {
        let err = compile("users", &columns(), &[filter("age", FilterOp::Lt, None)], None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn null_operands_match_like_equalities() {
        let w = compile(
            "users",
            &columns(),
            &[
                filter("name", FilterOp::Eq, Some(json!(null))),
                filter("age", FilterOp::Ne, Some(json!(null))),
            ],
            None,
        )
        .unwrap();
        assert_eq!(w.sql, "\"name\" IS NULL AND \"age\" IS NOT NULL");
        assert!(w.params.is_empty());

        let err = compile("users", &columns(), &[filter("age", FilterOp::Gt, Some(json!(null)))], None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(ref m) if m.contains("null")));
    }

    #[test]
    fn raw_fragment_is_parenthesized() {
        let w = compile(
            "users",
            &columns(),
            &[filter("age", FilterOp::Gt, Some(json!(1)))],
            Some(" name = 'a' OR name = 'b' "),
        )
        .unwrap();
        assert_eq!(w.sql, "\"age\" > ? AND (name = 'a' OR name = 'b')");
    }

    #[test]
    fn equalities_handle_null() {
        let mut cond = serde_json::Map::new();
        cond.insert("id".into(), json!(7));
        cond.insert("name".into(), serde_json::Value::Null);
        let w = compile_equalities("users", &columns(), &cond).unwrap();
        assert_eq!(w.sql, "\"id\" = ? AND \"name\" IS NULL");
        assert_eq!(w.params, vec![Value::Integer(7)]);
    }
}
