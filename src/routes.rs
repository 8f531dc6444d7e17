use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

use crate::handler::{self, AppState};

// Device exports of a whole reading history easily exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::healthcheck))
        .route("/upload", post(handler::upload))
        .route("/books", get(handler::list_books))
        .route("/books/:id", get(handler::get_book))
        .route("/books/:id", delete(handler::delete_book))
        .route("/books/:id/rename", post(handler::rename_book))
        .route("/books/:id/cover", post(handler::upload_cover))
        .route("/highlights/:id", delete(handler::delete_highlight))
        .route("/history", get(handler::list_history))
        .route("/history/:id/restore", post(handler::restore_item))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
