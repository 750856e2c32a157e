//! services/api/src/web/trips.rs
//!
//! Axum handlers for the trip collection.

use crate::error::{bad_request, port_failure, HandlerError};
use crate::web::dto::{
    parse_instant, required, CreateTripRequest, DefaultTripRequest, DefaultTripResponse,
    DeleteTripResponse, ListTripsQuery, PatchTripRequest, SuccessResponse, TripDto,
    TripIdResponse, TripResponse, TripsResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use trip_mate_core::domain::{NewTrip, DEFAULT_TRIP_NAME};

/// List the trips owned by a user, newest first.
#[utoipa::path(
    get,
    path = "/trips",
    params(ListTripsQuery),
    responses(
        (status = 200, description = "Trips of the user", body = TripsResponse),
        (status = 400, description = "Missing userId", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn list_trips_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListTripsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let owner = required(query.user_id, "userId")?;
    let trips = app_state
        .trips
        .list_trips(&owner)
        .await
        .map_err(|e| port_failure(e, "Failed to list trips"))?;
    Ok(Json(TripsResponse {
        trips: trips.into_iter().map(TripDto::from).collect(),
    }))
}

/// Create a trip.
#[utoipa::path(
    post,
    path = "/trips",
    request_body = CreateTripRequest,
    responses(
        (status = 201, description = "Trip created", body = TripIdResponse),
        (status = 400, description = "Missing or invalid field", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn create_trip_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CreateTripRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;

    let trip_name = required(request.trip_name, "tripName")?;
    let total_budget = request
        .total_budget
        .ok_or_else(|| bad_request("Missing required field: totalBudget"))?;
    let start_date = parse_instant(&required(request.start_date, "startDate")?, "startDate")?;
    let end_date = request
        .end_date
        .map(|d| parse_instant(&d, "endDate"))
        .transpose()?;
    let currency = required(request.currency, "currency")?;
    let member_count = request
        .member_count
        .ok_or_else(|| bad_request("Missing required field: memberCount"))?;
    if member_count < 1 {
        return Err(bad_request("memberCount must be at least 1"));
    }
    let created_by = required(request.created_by, "createdBy")?;

    let trip = app_state
        .trips
        .create_trip(NewTrip {
            trip_name,
            total_budget,
            start_date,
            end_date,
            currency,
            member_count,
            created_by,
        })
        .await
        .map_err(|e| port_failure(e, "Failed to create trip"))?;
    info!(trip_id = %trip.id, "trip created");
    Ok((StatusCode::CREATED, Json(TripIdResponse { trip_id: trip.id })))
}

/// Look up the user's default trip, creating it on first use.
#[utoipa::path(
    post,
    path = "/trips/default",
    request_body = DefaultTripRequest,
    responses(
        (status = 200, description = "Existing default trip", body = DefaultTripResponse),
        (status = 201, description = "Default trip created", body = DefaultTripResponse),
        (status = 400, description = "Missing userId", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn default_trip_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<DefaultTripRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let owner = required(request.user_id, "userId")?;

    let existing = app_state
        .trips
        .find_trip_by_name(&owner, DEFAULT_TRIP_NAME)
        .await
        .map_err(|e| port_failure(e, "Failed to initialize trip"))?;
    if let Some(trip) = existing {
        return Ok((
            StatusCode::OK,
            Json(DefaultTripResponse {
                trip_id: trip.id,
                created: false,
            }),
        ));
    }

    let trip = app_state
        .trips
        .create_trip(NewTrip::default_for(&owner, Utc::now()))
        .await
        .map_err(|e| port_failure(e, "Failed to initialize trip"))?;
    info!(trip_id = %trip.id, owner = %owner, "default trip created");
    Ok((
        StatusCode::CREATED,
        Json(DefaultTripResponse {
            trip_id: trip.id,
            created: true,
        }),
    ))
}

/// Fetch one trip.
#[utoipa::path(
    get,
    path = "/trips/{id}",
    params(("id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "The trip", body = TripResponse),
        (status = 404, description = "Trip not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn get_trip_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let trip = app_state
        .trips
        .get_trip(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to fetch trip"))?;
    Ok(Json(TripResponse {
        trip: TripDto::from(trip),
    }))
}

/// Update any subset of a trip's fields. The owner cannot be changed.
#[utoipa::path(
    patch,
    path = "/trips/{id}",
    params(("id" = String, Path, description = "Trip identifier")),
    request_body = PatchTripRequest,
    responses(
        (status = 200, description = "Trip updated", body = SuccessResponse),
        (status = 400, description = "Invalid field", body = crate::error::ErrorResponse),
        (status = 404, description = "Trip not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn patch_trip_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
    payload: Result<Json<PatchTripRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let patch = request.into_patch()?;
    app_state
        .trips
        .patch_trip(&trip_id, patch)
        .await
        .map_err(|e| port_failure(e, "Failed to update trip"))?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Delete a trip after deleting every item (and its assets) in it.
#[utoipa::path(
    delete,
    path = "/trips/{id}",
    params(("id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Trip deleted (or already gone)", body = DeleteTripResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn delete_trip_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let report = app_state
        .deleter
        .delete_trip(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to delete trip"))?;
    Ok(Json(DeleteTripResponse {
        success: true,
        items_deleted: report.items_deleted,
        partial: !report.orphaned_assets.is_empty(),
        orphaned_assets: report.orphaned_assets,
    }))
}
