//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use crate::error::ErrorResponse;
use crate::web::dto::{
    AnalysisResponse, AnalyzeExpensesRequest, AnalyzeImageRequest, CreateTripRequest,
    DefaultTripRequest, DefaultTripResponse, DeleteItemResponse, DeleteTripResponse,
    DeleteUploadRequest, ExpenseAnalysisResponse, FileFailureDto, IngestResponse,
    ItemIdResponse, ItemRequest, ItemResponse, ItemsResponse, PatchTripRequest,
    SuccessResponse, TripDto, TripIdResponse, TripItemDto, TripResponse, TripsResponse,
    UploadResponse,
};
use crate::web::{ai, items, media, trips};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        trips::list_trips_handler,
        trips::create_trip_handler,
        trips::default_trip_handler,
        trips::get_trip_handler,
        trips::patch_trip_handler,
        trips::delete_trip_handler,
        items::list_items_handler,
        items::create_item_handler,
        items::get_item_handler,
        items::replace_item_handler,
        items::delete_item_handler,
        items::live_items_handler,
        media::upload_handler,
        media::delete_upload_handler,
        media::ingest_handler,
        media::download_handler,
        ai::analyze_image_handler,
        ai::analyze_expenses_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            TripDto,
            TripsResponse,
            TripResponse,
            CreateTripRequest,
            PatchTripRequest,
            TripIdResponse,
            DefaultTripRequest,
            DefaultTripResponse,
            SuccessResponse,
            DeleteTripResponse,
            TripItemDto,
            ItemsResponse,
            ItemResponse,
            ItemRequest,
            ItemIdResponse,
            DeleteItemResponse,
            UploadResponse,
            DeleteUploadRequest,
            AnalyzeImageRequest,
            AnalysisResponse,
            AnalyzeExpensesRequest,
            ExpenseAnalysisResponse,
            FileFailureDto,
            IngestResponse
        )
    ),
    tags(
        (name = "trips", description = "Trips owned by a user."),
        (name = "items", description = "Expenses and memories recorded under a trip, including the live feed."),
        (name = "media", description = "Asset upload, batch ingestion and the download proxy."),
        (name = "ai", description = "Receipt classification and spending summaries.")
    )
)]
pub struct ApiDoc;
