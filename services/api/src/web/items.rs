//! services/api/src/web/items.rs
//!
//! Axum handlers for the items of one trip, including the live feed.
//!
//! The live feed is a server-sent-event stream. Every `snapshot` event carries
//! the complete ordered item list; the stream (and with it the subscription)
//! ends when the client disconnects.

use crate::error::{bad_request, port_failure, HandlerError};
use crate::web::dto::{
    DeleteItemResponse, ItemIdResponse, ItemRequest, ItemResponse, ItemsResponse, TripItemDto,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info};
use trip_mate_core::domain::TripItem;

fn items_body(items: &[TripItem]) -> ItemsResponse {
    ItemsResponse {
        items: items.iter().cloned().map(TripItemDto::from).collect(),
    }
}

/// List a trip's items, most recent event first.
#[utoipa::path(
    get,
    path = "/trips/{id}/items",
    params(("id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Items of the trip", body = ItemsResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_items_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let items = app_state
        .items
        .list_items(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to list items"))?;
    Ok(Json(items_body(&items)))
}

/// Create an item under a trip.
#[utoipa::path(
    post,
    path = "/trips/{id}/items",
    params(("id" = String, Path, description = "Trip identifier")),
    request_body = ItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemIdResponse),
        (status = 400, description = "Missing required field", body = crate::error::ErrorResponse),
        (status = 404, description = "Trip not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
    payload: Result<Json<ItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let item = request.into_new_item(None)?;
    let created = app_state
        .items
        .create_item(&trip_id, item)
        .await
        .map_err(|e| port_failure(e, "Failed to create item"))?;
    info!(trip_id = %trip_id, item_id = %created.id, "item created");
    Ok((
        StatusCode::CREATED,
        Json(ItemIdResponse {
            item_id: created.id,
        }),
    ))
}

/// Fetch one item.
#[utoipa::path(
    get,
    path = "/trips/{id}/items/{item_id}",
    params(
        ("id" = String, Path, description = "Trip identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    responses(
        (status = 200, description = "The item", body = ItemResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path((trip_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let item = app_state
        .items
        .get_item(&trip_id, &item_id)
        .await
        .map_err(|e| port_failure(e, "Failed to fetch item"))?
        .ok_or_else(|| {
            crate::error::error_response(StatusCode::NOT_FOUND, format!("Item {} not found", item_id))
        })?;
    Ok(Json(ItemResponse {
        item: TripItemDto::from(item),
    }))
}

/// Overwrite the editable fields of an item.
#[utoipa::path(
    put,
    path = "/trips/{id}/items/{item_id}",
    params(
        ("id" = String, Path, description = "Trip identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    request_body = ItemRequest,
    responses(
        (status = 200, description = "Item replaced", body = ItemResponse),
        (status = 400, description = "Missing required field", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn replace_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path((trip_id, item_id)): Path<(String, String)>,
    payload: Result<Json<ItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    // The stored owner is kept, so any placeholder works here.
    let item = request.into_new_item(Some(""))?;
    let replaced = app_state
        .items
        .replace_item(&trip_id, &item_id, item)
        .await
        .map_err(|e| port_failure(e, "Failed to update item"))?;
    Ok(Json(ItemResponse {
        item: TripItemDto::from(replaced),
    }))
}

/// Delete an item and its stored assets. Deleting a missing item succeeds.
#[utoipa::path(
    delete,
    path = "/trips/{id}/items/{item_id}",
    params(
        ("id" = String, Path, description = "Trip identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    responses(
        (status = 200, description = "Item deleted or already gone", body = DeleteItemResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path((trip_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = app_state
        .deleter
        .delete_item(&trip_id, &item_id)
        .await
        .map_err(|e| port_failure(e, "Failed to delete item"))?;
    Ok(Json(DeleteItemResponse {
        success: true,
        already_deleted: outcome.already_deleted,
        partial: outcome.is_partial(),
        orphaned_assets: outcome.orphaned_assets,
    }))
}

/// Stream full item snapshots as server-sent events.
#[utoipa::path(
    get,
    path = "/trips/{id}/items/live",
    params(("id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Event stream of `snapshot` events carrying `{items}`", content_type = "text/event-stream"),
        (status = 404, description = "Trip not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn live_items_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HandlerError> {
    app_state
        .trips
        .get_trip(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to open live feed"))?;
    let mut subscription = app_state
        .items
        .subscribe(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to open live feed"))?;
    info!(trip_id = %trip_id, "live feed opened");

    let stream = async_stream::stream! {
        while let Some(snapshot) = subscription.next().await {
            match Event::default().event("snapshot").json_data(items_body(&snapshot)) {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    error!(trip_id = %trip_id, error = %e, "failed to encode snapshot");
                    break;
                }
            }
        }
        debug!(trip_id = %trip_id, "live feed closed");
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
