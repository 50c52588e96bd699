use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

use crate::error::AppError;

/// The compiled frontend bundle, embedded at build time.
#[derive(RustEmbed)]
#[folder = "web/dist/"]
struct Frontend;

const INDEX: &str = "index.html";

/// Serves embedded files; any other non-API path gets the SPA entry document
/// so the client-side router can take over.
pub async fn serve(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if path == "api" || path.starts_with("api/") {
        return AppError::NotFound(uri.path().to_string()).into_response();
    }
    if path.is_empty() {
        return file(INDEX);
    }
    if Frontend::get(path).is_some() {
        return file(path);
    }
    if path.starts_with("assets/") || looks_like_file(path) {
        return StatusCode::NOT_FOUND.into_response();
    }
    file(INDEX)
}

fn file(path: &str) -> Response {
    match Frontend::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Top-level files such as `vite.svg`. Deeper paths may be client routes
/// naming a table with a dot in it.
fn looks_like_file(path: &str) -> bool {
    !path.contains('/') && path.contains('.')
}
