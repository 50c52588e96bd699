mod assets;
mod error;
mod handlers;
mod protocol;
mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::{
    cli::Args,
    core::connection::{Database, OpenOptions},
    error::{AppError, AppResult},
};

use handlers::AppState;

/// Opens the database and serves the API and frontend until Ctrl-C.
pub async fn run(args: Args) -> AppResult<()> {
    let Some(db_path) = args.db.as_deref() else {
        return Err(AppError::InvalidRequest(
            "Database path is required. Use --db flag to specify the SQLite database file.".into(),
        ));
    };

    let opts = OpenOptions {
        busy_timeout_ms: args.busy_timeout_ms,
        foreign_keys: args.foreign_keys,
    };
    let db = Database::open(db_path, &opts)?;
    if args.allow_raw_where {
        tracing::warn!("raw where_clause filters are enabled; clients can send arbitrary SQL fragments");
    }

    let state = Arc::new(AppState {
        db,
        max_rows: args.max_rows,
        allow_raw_where: args.allow_raw_where,
    });
    let app = routes::router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, db = %db_path.display(), "sqliter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
