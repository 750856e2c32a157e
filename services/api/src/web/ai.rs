//! services/api/src/web/ai.rs
//!
//! Axum handlers that proxy the AI gateway.

use crate::error::{bad_request, port_failure, HandlerError};
use crate::web::dto::{
    required, AnalysisResponse, AnalyzeExpensesRequest, AnalyzeImageRequest,
    ExpenseAnalysisResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use trip_mate_core::analysis;

/// Classify a receipt or photo into an expense or memory draft.
#[utoipa::path(
    post,
    path = "/ai/analyze-image",
    request_body = AnalyzeImageRequest,
    responses(
        (status = 200, description = "Structured analysis", body = AnalysisResponse),
        (status = 400, description = "Missing base64Data or mimeType", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to analyze image", body = crate::error::ErrorResponse)
    ),
    tag = "ai"
)]
pub async fn analyze_image_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeImageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let base64_data = required(request.base64_data, "base64Data")?;
    let mime_type = required(request.mime_type, "mimeType")?;

    let result = analysis::analyze_image(app_state.ai.as_ref(), &base64_data, &mime_type)
        .await
        .map_err(|e| port_failure(e, "Failed to analyze image"))?;
    Ok(Json(AnalysisResponse::from(result)))
}

/// Produce a short prose summary of a list of expenses.
#[utoipa::path(
    post,
    path = "/ai/analyze-expenses",
    request_body = AnalyzeExpensesRequest,
    responses(
        (status = 200, description = "Spending summary", body = ExpenseAnalysisResponse),
        (status = 400, description = "Missing or invalid expenses array", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to analyze expenses", body = crate::error::ErrorResponse)
    ),
    tag = "ai"
)]
pub async fn analyze_expenses_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeExpensesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let expenses = request
        .expenses
        .filter(|v| v.is_array())
        .ok_or_else(|| bad_request("Missing or invalid expenses array"))?;

    let analysis = app_state
        .ai
        .summarize_expenses(&expenses.to_string())
        .await
        .map_err(|e| port_failure(e, "Failed to analyze expenses"))?;
    Ok(Json(ExpenseAnalysisResponse { analysis }))
}
