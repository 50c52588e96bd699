use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::core::types::{ColumnInfo, TableInfo};
use crate::error::{AppError, AppResult};

pub fn list_tables(conn: &Connection) -> AppResult<Vec<TableInfo>> {
    let mut stmt = conn.prepare(
        r"SELECT name, type FROM sqlite_master
          WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
          ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(TableInfo {
                name: r.get(0)?,
                kind: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Looks the name up in the catalog. Only names that exist verbatim are ever
/// spliced into SQL text.
pub fn resolve_table(conn: &Connection, table: &str) -> AppResult<String> {
    let found: Option<String> = conn
        .query_row(
            r"SELECT name FROM sqlite_master
              WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\' AND name = ?1",
            [table],
            |r| r.get(0),
        )
        .optional()?;
    found.ok_or_else(|| AppError::TableNotFound(table.to_string()))
}

pub fn table_schema(conn: &Connection, table: &str) -> AppResult<Vec<ColumnInfo>> {
    let table = resolve_table(conn, table)?;

    let mut stmt = conn
        .prepare(r#"SELECT cid, name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1)"#)
        .map_err(schema_err)?;
    let mut columns = stmt
        .query_map([&table], |row: &Row<'_>| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
                unique: false,
            })
        })
        .map_err(schema_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(schema_err)?;

    let unique = unique_columns(conn, &table).map_err(schema_err)?;
    for col in &mut columns {
        col.unique = unique.contains(&col.name);
    }

    tracing::debug!(table = %table, columns = columns.len(), "resolved schema");
    Ok(columns)
}

/// Columns covered by a unique index on exactly one column. Composite unique
/// indexes are not attributed to any single column.
fn unique_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut list = conn.prepare(r#"SELECT name FROM pragma_index_list(?1) WHERE "unique" = 1"#)?;
    let indexes = list
        .query_map([table], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
    let mut out = HashSet::new();
    for index in indexes {
        let cols = info
            .query_map([&index], |r| r.get::<_, Option<String>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if let [Some(only)] = cols.as_slice() {
            out.insert(only.clone());
        }
    }
    Ok(out)
}

/// Fails unless `column` is one of the resolved columns.
pub fn require_column<'a>(
    columns: &'a [ColumnInfo],
    table: &str,
    column: &str,
) -> AppResult<&'a ColumnInfo> {
    columns
        .iter()
        .find(|c| c.name == column)
        .ok_or_else(|| AppError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Double-quotes an identifier, doubling any embedded quote.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn schema_err(e: rusqlite::Error) -> AppError {
    AppError::SchemaError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                age INTEGER DEFAULT 18
            );
            CREATE TABLE memberships (
                user_id INTEGER,
                group_id INTEGER,
                nickname TEXT,
                UNIQUE (user_id, group_id)
            );
            CREATE UNIQUE INDEX idx_memberships_nickname ON memberships(nickname);
            CREATE TABLE \"odd \"\"name\" (x);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn lists_user_tables_in_order() {
        let conn = fixture();
        let tables = list_tables(&conn).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        // AUTOINCREMENT creates sqlite_sequence, which must stay hidden.
        assert_eq!(names, vec!["memberships", "odd \"name", "users"]);
        assert!(tables.iter().all(|t| t.kind == "table"));
    }

    #[test]
    fn reads_column_metadata() {
        let conn = fixture();
        let cols = table_schema(&conn, "users").unwrap();
        assert_eq!(cols.len(), 4);

        let id = &cols[0];
        assert_eq!(id.name, "id");
        assert!(id.primary_key);
        assert_eq!(id.decl_type, "INTEGER");

        let name = &cols[1];
        assert!(name.not_null);
        assert!(!name.unique);

        let email = &cols[2];
        assert!(email.unique);
        assert!(email.not_null);

        let age = &cols[3];
        assert_eq!(age.default_value.as_deref(), Some("18"));
        assert!(!age.not_null);
    }

    #[test]
    fn composite_unique_is_not_attributed() {
        let conn = fixture();
        let cols = table_schema(&conn, "memberships").unwrap();
        let flag = |n: &str| cols.iter().find(|c| c.name == n).unwrap().unique;
        assert!(!flag("user_id"));
        assert!(!flag("group_id"));
        assert!(flag("nickname"));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let conn = fixture();
        let err = table_schema(&conn, "users; DROP TABLE users").unwrap_err();
        assert!(matches!(err, AppError::TableNotFound(_)));
        assert!(matches!(
            resolve_table(&conn, "sqlite_sequence"),
            Err(AppError::TableNotFound(_))
        ));
        assert_eq!(list_tables(&conn).unwrap().len(), 3);
    }

    #[test]
    fn only_the_reserved_prefix_is_hidden() {
        let conn = fixture();
        conn.execute_batch("CREATE TABLE sqlitestudio_notes (x); CREATE TABLE sqlite1 (y);")
            .unwrap();
        let names: Vec<_> = list_tables(&conn)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(names.contains(&"sqlitestudio_notes".to_string()));
        assert!(names.contains(&"sqlite1".to_string()));
        assert!(!names.contains(&"sqlite_sequence".to_string()));

        assert_eq!(table_schema(&conn, "sqlitestudio_notes").unwrap()[0].name, "x");
        assert_eq!(resolve_table(&conn, "sqlite1").unwrap(), "sqlite1");
    }

    #[test]
    fn quoted_names_resolve() {
        let conn = fixture();
        let cols = table_schema(&conn, "odd \"name").unwrap();
        assert_eq!(cols[0].name, "x");
        assert_eq!(quote_ident("odd \"name"), "\"odd \"\"name\"");
    }
}
