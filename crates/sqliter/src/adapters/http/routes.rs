use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{assets, handlers, handlers::AppState};

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/info", get(handlers::info))
        .route("/tables", get(handlers::list_tables))
        .route("/tables/:table/schema", get(handlers::table_schema))
        .route("/tables/:table/data", get(handlers::table_data))
        .route("/tables/:table/export/csv", get(handlers::export_csv))
        .route(
            "/tables/:table/rows",
            post(handlers::insert_row)
                .put(handlers::update_row)
                .delete(handlers::delete_row),
        )
        .route("/tables/:table/rows/bulk", put(handlers::bulk_update))
        .route("/tables/:table/rows/bulk-delete", post(handlers::bulk_delete))
        .route("/sql/execute", post(handlers::execute_sql))
        .fallback(handlers::api_not_found)
        .with_state(state);

    // Single-operator admin tool: any origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .fallback(assets::serve)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
