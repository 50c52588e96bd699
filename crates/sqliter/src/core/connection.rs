use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::Duration,
};

use rusqlite::{Connection, OpenFlags};
use tokio::sync::oneshot;

use crate::{
    core::{
        mutate::{self, Fields},
        query, schema,
        types::{
            ColumnInfo, DatabaseInfo, MutationResult, SqlQueryResult, TableData, TableInfo,
            TableQuery,
        },
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 2_000,
            foreign_keys: true,
        }
    }
}

type DbJob = Box<dyn FnOnce(&mut Connection) + Send>;

/// Handle to the single connection. The connection itself lives on a
/// dedicated worker thread; every clone submits jobs to that thread. The
/// worker exits and the connection closes once the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Database {
    tx: mpsc::Sender<DbJob>,
    filename: String,
}

impl Database {
    pub fn open(path: &Path, opts: &OpenOptions) -> AppResult<Self> {
        let conn = open_conn(path, opts)?;
        tracing::info!(path = %path.display(), "database opened");
        Self::spawn(conn, path.to_path_buf())
    }

    /// Wraps an already-open connection (in-memory databases in tests).
    #[cfg(test)]
    pub fn from_connection(conn: Connection, db_path: PathBuf) -> AppResult<Self> {
        Self::spawn(conn, db_path)
    }

    fn spawn(conn: Connection, db_path: PathBuf) -> AppResult<Self> {
        let (tx, rx) = mpsc::channel::<DbJob>();
        thread::Builder::new()
            .name("sqliter-db".into())
            .spawn(move || db_worker_main(conn, rx))?;
        let filename = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| db_path.display().to_string());
        Ok(Self { tx, filename })
    }

    /// Runs `f` on the worker thread and awaits its result.
    pub async fn call<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Box::new(move |conn: &mut Connection| {
                let _ = tx.send(f(conn));
            }))
            .map_err(|_| AppError::Internal("db worker unavailable".into()))?;
        rx.await
            .map_err(|_| AppError::Internal("db worker dropped response".into()))?
    }

    pub fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            filename: self.filename.clone(),
        }
    }

    pub async fn tables(&self) -> AppResult<Vec<TableInfo>> {
        self.call(|conn| schema::list_tables(conn)).await
    }

    pub async fn schema(&self, table: String) -> AppResult<Vec<ColumnInfo>> {
        self.call(move |conn| schema::table_schema(conn, &table)).await
    }

    pub async fn table_data(&self, table: String, q: TableQuery) -> AppResult<TableData> {
        self.call(move |conn| query::table_data(conn, &table, &q)).await
    }

    pub async fn export_csv(&self, table: String, q: TableQuery) -> AppResult<Vec<u8>> {
        self.call(move |conn| query::export_csv(conn, &table, &q)).await
    }

    pub async fn insert(&self, table: String, data: Fields) -> AppResult<MutationResult> {
        self.call(move |conn| mutate::insert(conn, &table, &data)).await
    }

    pub async fn update(
        &self,
        table: String,
        data: Fields,
        conditions: Fields,
    ) -> AppResult<MutationResult> {
        self.call(move |conn| mutate::update(conn, &table, &data, &conditions))
            .await
    }

    pub async fn delete(&self, table: String, conditions: Fields) -> AppResult<MutationResult> {
        self.call(move |conn| mutate::delete(conn, &table, &conditions))
            .await
    }

    pub async fn bulk_update(
        &self,
        table: String,
        data: Fields,
        targets: Vec<Fields>,
    ) -> AppResult<MutationResult> {
        self.call(move |conn| mutate::bulk_update(conn, &table, &data, &targets))
            .await
    }

    pub async fn bulk_delete(&self, table: String, targets: Vec<Fields>) -> AppResult<MutationResult> {
        self.call(move |conn| mutate::bulk_delete(conn, &table, &targets))
            .await
    }

    pub async fn execute_sql(&self, sql: String) -> AppResult<SqlQueryResult> {
        self.call(move |conn| query::execute_sql(conn, &sql)).await
    }
}

fn db_worker_main(mut conn: Connection, rx: mpsc::Receiver<DbJob>) {
    while let Ok(job) = rx.recv() {
        job(&mut conn);
    }
    if let Err((_, e)) = conn.close() {
        tracing::warn!(error = %e, "failed to close database cleanly");
    } else {
        tracing::info!("database closed");
    }
}

fn open_conn(path: &Path, opts: &OpenOptions) -> AppResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let failed = |source| AppError::DbOpenFailed {
        path: path.to_path_buf(),
        source,
    };
    let conn = Connection::open_with_flags(path, flags).map_err(failed)?;
    conn.busy_timeout(Duration::from_millis(opts.busy_timeout_ms))
        .map_err(failed)?;
    conn.pragma_update(None, "foreign_keys", opts.foreign_keys)
        .map_err(failed)?;
    // Opening is lazy; touch the file so a bad path or non-database fails here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))
        .map_err(failed)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn opens_file_and_reports_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        let db = Database::open(&path, &OpenOptions::default()).unwrap();
        assert_eq!(db.info().filename, "library.db");

        db.execute_sql("CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT)".into())
            .await
            .unwrap();
        let mut row = Fields::new();
        row.insert("title".into(), json!("Dune"));
        db.insert("books".into(), row).await.unwrap();

        let tables = db.tables().await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "books");
    }

    #[test]
    fn rejects_non_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "definitely not sqlite, but long enough to have a header ....").unwrap();
        let err = Database::open(&path, &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::DbOpenFailed { .. }));
    }

    #[test]
    fn rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("x.db");
        assert!(Database::open(&path, &OpenOptions::default()).is_err());
    }

    #[tokio::test]
    async fn enables_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("fk.db"), &OpenOptions::default()).unwrap();
        let on: i64 = db
            .call(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(on, 1);
    }
}
