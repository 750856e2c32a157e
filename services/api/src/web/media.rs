//! services/api/src/web/media.rs
//!
//! Axum handlers that move bytes: single-asset upload and delete, batch
//! ingestion, and the download proxy.

use crate::adapters::fetcher::{FetchError, FetchedAsset};
use crate::error::{bad_request, error_response, port_failure, HandlerError};
use crate::web::dto::{
    DeleteUploadRequest, DownloadQuery, IngestResponse, SuccessResponse, UploadResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{multipart::Field, rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, warn};
use trip_mate_core::ingestion::{FileFailure, IngestionPipeline, SelectedFile, Stage};
use trip_mate_core::paths::sanitize_file_name;

/// Downloads larger than this are served but never cached.
const MAX_CACHED_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;

fn multipart_error(e: impl std::fmt::Display) -> HandlerError {
    bad_request(format!("Failed to read multipart data: {}", e))
}

async fn read_file(field: Field<'_>) -> Result<SelectedFile, HandlerError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field.bytes().await.map_err(multipart_error)?;
    Ok(SelectedFile {
        file_name,
        content_type,
        data,
    })
}

/// Reads one batch file under its kind's ceiling. Once a file goes over, the
/// rest of it is drained without being kept.
async fn read_capped(
    ingestion: &IngestionPipeline,
    mut field: Field<'_>,
) -> Result<Result<SelectedFile, FileFailure>, HandlerError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let mut data = Vec::new();
    let mut size: u64 = 0;
    let mut rejection = None;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size = size.saturating_add(chunk.len() as u64);
        if rejection.is_some() {
            continue;
        }
        match ingestion.validate(&content_type, size) {
            Ok(_) => data.extend_from_slice(&chunk),
            Err(e) => {
                data = Vec::new();
                rejection = Some(e);
            }
        }
    }
    Ok(match rejection {
        Some(e) => Err(FileFailure {
            file_name,
            stage: Stage::SizeValidation,
            message: e.to_string(),
        }),
        None => Ok(SelectedFile {
            file_name,
            content_type,
            data: Bytes::from(data),
        }),
    })
}

async fn read_text(field: Field<'_>) -> Result<String, HandlerError> {
    field
        .text()
        .await
        .map(|t| t.trim().to_string())
        .map_err(multipart_error)
}

//=========================================================================================
// Single Asset Upload
//=========================================================================================

/// Upload one image or video. Images also get a thumbnail and a blur placeholder.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content_type = "multipart/form-data", description = "Parts: `file` and `tripId`."),
    responses(
        (status = 200, description = "Asset stored", body = UploadResponse),
        (status = 400, description = "No file or tripId, bad type, or too large", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "media"
)]
pub async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut file = None;
    let mut trip_id = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(read_file(field).await?),
            Some("tripId") => trip_id = Some(read_text(field).await?),
            _ => {}
        }
    }

    let file = file.ok_or_else(|| bad_request("No file provided"))?;
    let trip_id = trip_id
        .filter(|t| !t.is_empty())
        .ok_or_else(|| bad_request("No tripId provided"))?;

    let kind = app_state
        .ingestion
        .validate(&file.content_type, file.size())
        .map_err(|e| port_failure(e, "Failed to upload file"))?;
    let asset = app_state
        .ingestion
        .upload_asset(&trip_id, &file, kind)
        .await
        .map_err(|e| port_failure(e, "Failed to upload file"))?;
    info!(trip_id = %trip_id, path = %asset.path, size = asset.size, "asset uploaded");
    Ok(Json(UploadResponse::from(asset)))
}

/// Delete one stored asset by path.
#[utoipa::path(
    delete,
    path = "/upload",
    request_body = DeleteUploadRequest,
    responses(
        (status = 200, description = "Asset deleted", body = SuccessResponse),
        (status = 400, description = "No path provided", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "media"
)]
pub async fn delete_upload_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<DeleteUploadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let path = request
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| bad_request("No path provided"))?;
    app_state
        .objects
        .delete(&path)
        .await
        .map_err(|e| port_failure(e, "Failed to delete file"))?;
    Ok(Json(SuccessResponse { success: true }))
}

//=========================================================================================
// Batch Ingestion
//=========================================================================================

/// Turn several files into items, one after another. Failing files are
/// reported without stopping the batch. The request as a whole has no size
/// limit; each file is held to its own kind's ceiling instead.
#[utoipa::path(
    post,
    path = "/trips/{id}/ingest",
    params(("id" = String, Path, description = "Trip identifier")),
    request_body(content_type = "multipart/form-data", description = "Parts: `createdBy` and any number of `file` parts."),
    responses(
        (status = 200, description = "Batch summary", body = IngestResponse),
        (status = 400, description = "Missing createdBy", body = crate::error::ErrorResponse),
        (status = 404, description = "Trip not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    tag = "media"
)]
pub async fn ingest_handler(
    State(app_state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut files = Vec::new();
    let mut rejected = Vec::new();
    let mut created_by = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") | Some("files") => match read_capped(&app_state.ingestion, field).await? {
                Ok(file) => files.push(file),
                Err(failure) => {
                    warn!(
                        trip_id = %trip_id,
                        file = %failure.file_name,
                        error = %failure.message,
                        "file skipped before buffering"
                    );
                    rejected.push(failure);
                }
            },
            Some("createdBy") => created_by = Some(read_text(field).await?),
            _ => {}
        }
    }
    let created_by = created_by
        .filter(|c| !c.is_empty())
        .ok_or_else(|| bad_request("Missing required field: createdBy"))?;

    app_state
        .trips
        .get_trip(&trip_id)
        .await
        .map_err(|e| port_failure(e, "Failed to ingest files"))?;

    let mut report = app_state
        .ingestion
        .ingest_batch(&trip_id, &created_by, &files, |_| {})
        .await;
    report.total += rejected.len();
    report.failures.extend(rejected);
    info!(
        trip_id = %trip_id,
        total = report.total,
        failed = report.failed(),
        outcome = report.outcome().as_str(),
        "batch ingested"
    );
    Ok(Json(IngestResponse::from(report)))
}

//=========================================================================================
// Download Proxy
//=========================================================================================

fn cached(app_state: &AppState, url: &str) -> Option<FetchedAsset> {
    app_state
        .download_cache
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&url.to_string())
}

fn remember(app_state: &AppState, url: &str, asset: &FetchedAsset) {
    if asset.data.len() > MAX_CACHED_DOWNLOAD_BYTES {
        return;
    }
    app_state
        .download_cache
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .put(url.to_string(), asset.clone());
}

/// Fetch a remote asset and return it as an attachment.
#[utoipa::path(
    get,
    path = "/download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "The file as an attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Missing or invalid url", body = crate::error::ErrorResponse),
        (status = 500, description = "Download failed", body = crate::error::ErrorResponse)
    ),
    tag = "media"
)]
pub async fn download_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| bad_request("URL is required"))?;
    let parsed = url::Url::parse(&url).map_err(|_| bad_request("URL is invalid"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(bad_request("Only http and https URLs can be downloaded"));
    }
    let filename = sanitize_file_name(query.filename.as_deref().unwrap_or("download"));

    let asset = match cached(&app_state, &url) {
        Some(asset) => asset,
        None => {
            let asset = app_state.fetcher.fetch(&url).await.map_err(|e| match e {
                FetchError::Upstream(status) => error_response(
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    "Failed to fetch file",
                ),
                FetchError::Transport(msg) => {
                    error!(url = %url, error = %msg, "download proxy failed");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Download failed")
                }
            })?;
            remember(&app_state, &url, &asset);
            asset
        }
    };

    let content_type = asset
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        asset.data,
    ))
}
