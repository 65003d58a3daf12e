pub mod protocol;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use rest::*;
use state::AppState;

/// Upper bound for request bodies; slide PDFs can be large.
pub const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Builds the `/api` router.
pub fn router(app_state: Arc<AppState>) -> Router {
    let series_root = get(list_series_handler).post(create_series_handler);

    let api = Router::new()
        .route("/lecture-series", series_root.clone())
        .route("/lecture-series/", series_root)
        .route(
            "/lecture-series/{id}",
            get(get_series_handler).delete(delete_series_handler),
        )
        .route("/lecture-series/{id}/decks", get(list_series_decks_handler))
        .route("/lecture-series/{id}/upload", post(upload_handler))
        .route("/jobs/{id}", get(get_job_handler))
        .route(
            "/slide-decks/{id}",
            get(get_deck_handler)
                .put(rename_deck_handler)
                .delete(delete_deck_handler),
        )
        .route("/slide-decks/{id}/pdf", get(deck_pdf_handler))
        .route("/slide-decks/{id}/slides", get(list_deck_slides_handler))
        .route("/search", get(search_handler))
        .route("/export", get(export_handler))
        .route("/import", post(import_handler))
        .route("/reindex", post(reindex_handler));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
