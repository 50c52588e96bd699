use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "sqliter", version, about = "Browse and edit a SQLite database from the browser")]
pub struct Args {
    /// Path to the SQLite database file.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Port to run the server on.
    #[arg(long, default_value_t = 2826)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Logging level (stderr). Also supports RUST_LOG.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Maximum rows returned per page (unless a smaller limit is provided).
    #[arg(long, default_value_t = 1000)]
    pub max_rows: usize,

    /// How long a statement waits on a locked database before failing.
    #[arg(long, default_value_t = 2_000)]
    pub busy_timeout_ms: u64,

    /// Enforce foreign key constraints on the connection.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub foreign_keys: bool,

    /// Accept the legacy raw `where_clause` query parameter.
    #[arg(long)]
    pub allow_raw_where: bool,
}
