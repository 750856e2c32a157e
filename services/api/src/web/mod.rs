pub mod ai;
pub mod dto;
pub mod items;
pub mod media;
pub mod rest;
pub mod state;
pub mod trips;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Builds the API router over the shared state. CORS and the Swagger UI are
/// layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit();
    Router::new()
        .route(
            "/trips",
            get(trips::list_trips_handler).post(trips::create_trip_handler),
        )
        .route("/trips/default", post(trips::default_trip_handler))
        .route(
            "/trips/{id}",
            get(trips::get_trip_handler)
                .patch(trips::patch_trip_handler)
                .delete(trips::delete_trip_handler),
        )
        .route(
            "/trips/{id}/items",
            get(items::list_items_handler).post(items::create_item_handler),
        )
        .route("/trips/{id}/items/live", get(items::live_items_handler))
        .route(
            "/trips/{id}/items/{item_id}",
            get(items::get_item_handler)
                .put(items::replace_item_handler)
                .delete(items::delete_item_handler),
        )
        .route(
            "/upload",
            post(media::upload_handler).delete(media::delete_upload_handler),
        )
        .route("/download", get(media::download_handler))
        .route("/ai/analyze-image", post(ai::analyze_image_handler))
        .route("/ai/analyze-expenses", post(ai::analyze_expenses_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        // Added after the layer above so batches are bounded per file, not per request.
        .route(
            "/trips/{id}/ingest",
            post(media::ingest_handler).layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}
