//! services/api/src/web/dto.rs
//!
//! JSON request and response bodies. Field names are camelCase on the wire.
//! Request bodies keep every field optional so that a missing field produces a
//! readable 400 instead of a generic deserialization failure.

use crate::error::{bad_request, HandlerError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use trip_mate_core::domain::{
    AnalysisResult, Category, ItemType, NewTripItem, Trip, TripItem, UploadedAsset,
};
use trip_mate_core::ingestion::{BatchReport, FileFailure};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Field Helpers
//=========================================================================================

/// Returns the trimmed value or a 400 naming the missing field.
pub fn required(value: Option<String>, field: &str) -> Result<String, HandlerError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(format!("Missing required field: {}", field)))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_instant(value: &str, field: &str) -> Result<DateTime<Utc>, HandlerError> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| bad_request(format!("Invalid date for field {}: '{}'", field, value)))
}

fn parse_optional_instant(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, HandlerError> {
    value.map(|v| parse_instant(&v, field)).transpose()
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

//=========================================================================================
// Trips
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripDto {
    pub id: String,
    pub trip_name: String,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub currency: String,
    pub member_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Trip> for TripDto {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            trip_name: trip.trip_name,
            total_budget: trip.total_budget,
            start_date: trip.start_date,
            end_date: trip.end_date,
            currency: trip.currency,
            member_count: trip.member_count,
            created_by: trip.created_by,
            created_at: trip.created_at,
            updated_at: trip.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTripsQuery {
    /// Owner whose trips are listed.
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TripsResponse {
    pub trips: Vec<TripDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TripResponse {
    pub trip: TripDto,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub trip_name: Option<String>,
    pub total_budget: Option<f64>,
    /// `YYYY-MM-DD` or RFC 3339.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub currency: Option<String>,
    pub member_count: Option<i64>,
    pub created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchTripRequest {
    pub trip_name: Option<String>,
    pub total_budget: Option<f64>,
    pub start_date: Option<String>,
    /// `null` clears the end date.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<Option<String>>,
    pub currency: Option<String>,
    pub member_count: Option<i64>,
}

impl PatchTripRequest {
    pub fn into_patch(self) -> Result<trip_mate_core::TripPatch, HandlerError> {
        Ok(trip_mate_core::TripPatch {
            trip_name: self.trip_name,
            total_budget: self.total_budget,
            start_date: parse_optional_instant(self.start_date, "startDate")?,
            end_date: self
                .end_date
                .map(|end| parse_optional_instant(end, "endDate"))
                .transpose()?,
            currency: self.currency,
            member_count: self.member_count,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripIdResponse {
    pub trip_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTripRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTripResponse {
    pub trip_id: String,
    /// `true` when the trip did not exist and was created by this call.
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTripResponse {
    pub success: bool,
    pub items_deleted: usize,
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orphaned_assets: Vec<String>,
}

//=========================================================================================
// Items
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripItemDto {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub description: String,
    pub created_by: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TripItem> for TripItemDto {
    fn from(item: TripItem) -> Self {
        Self {
            id: item.id,
            trip_id: item.trip_id,
            name: item.name,
            amount: item.amount,
            category: item.category.to_string(),
            item_type: item.item_type.to_string(),
            image_url: item.image_url,
            thumbnail_url: item.thumbnail_url,
            blur_data_url: item.blur_data_url,
            video_url: item.video_url,
            images: item.images,
            description: item.description,
            created_by: item.created_by,
            timestamp: item.timestamp,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemsResponse {
    pub items: Vec<TripItemDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub item: TripItemDto,
}

/// Body of both item creation and full overwrite.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub created_by: Option<String>,
    pub amount: Option<f64>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub blur_data_url: Option<String>,
    pub video_url: Option<String>,
    pub images: Option<Vec<String>>,
    pub timestamp: Option<String>,
    pub description: Option<String>,
}

impl ItemRequest {
    /// Validates the request. `fallback_owner` stands in for a missing
    /// `createdBy` on overwrites, where the stored owner is kept anyway.
    pub fn into_new_item(self, fallback_owner: Option<&str>) -> Result<NewTripItem, HandlerError> {
        let name = required(self.name, "name")?;
        let category = Category::from_str_lossy(&required(self.category, "category")?);
        let item_type = ItemType::from_str_lossy(&required(self.item_type, "type")?);
        let created_by = match (self.created_by, fallback_owner) {
            (Some(owner), _) if !owner.trim().is_empty() => owner.trim().to_string(),
            (_, Some(fallback)) => fallback.to_string(),
            _ => return Err(bad_request("Missing required field: createdBy")),
        };

        let mut item = NewTripItem::new(&name, category, item_type, &created_by);
        item.amount = self.amount.unwrap_or(0.0);
        item.image_url = self.image_url;
        item.thumbnail_url = self.thumbnail_url;
        item.blur_data_url = self.blur_data_url;
        item.video_url = self.video_url;
        item.images = self.images.unwrap_or_default();
        item.description = self.description.unwrap_or_default();
        item.timestamp = parse_optional_instant(self.timestamp, "timestamp")?;
        Ok(item.normalized())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdResponse {
    pub item_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemResponse {
    pub success: bool,
    pub already_deleted: bool,
    /// `true` when the document is gone but some assets could not be removed.
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orphaned_assets: Vec<String>,
}

//=========================================================================================
// Uploads, AI and Downloads
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub thumbnail_url: String,
    pub blur_data_url: Option<String>,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub is_video: bool,
}

impl From<UploadedAsset> for UploadResponse {
    fn from(asset: UploadedAsset) -> Self {
        let is_video = asset.is_video();
        Self {
            url: asset.url,
            thumbnail_url: asset.thumbnail_url,
            blur_data_url: asset.blur_data_url,
            path: asset.path,
            thumbnail_path: asset.thumbnail_path,
            name: asset.name,
            size: asset.size,
            content_type: asset.content_type,
            is_video,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUploadRequest {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageRequest {
    pub base64_data: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    #[serde(rename = "type")]
    pub item_type: String,
    pub category: String,
    pub name: String,
    pub amount: f64,
    pub description: String,
}

impl From<AnalysisResult> for AnalysisResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            item_type: result.item_type.to_string(),
            category: result.category.to_string(),
            name: result.name,
            amount: result.amount,
            description: result.description,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeExpensesRequest {
    #[schema(value_type = Option<Vec<Object>>)]
    pub expenses: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseAnalysisResponse {
    pub analysis: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Remote asset to fetch.
    pub url: Option<String>,
    /// Name offered to the browser.
    pub filename: Option<String>,
}

//=========================================================================================
// Batch Ingestion
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileFailureDto {
    pub file_name: String,
    pub stage: String,
    pub message: String,
}

impl From<FileFailure> for FileFailureDto {
    fn from(failure: FileFailure) -> Self {
        Self {
            file_name: failure.file_name,
            stage: failure.stage.to_string(),
            message: failure.message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `all_succeeded`, `partial_failure` or `all_failed`.
    pub outcome: String,
    pub message: String,
    pub item_ids: Vec<String>,
    pub failures: Vec<FileFailureDto>,
}

impl From<BatchReport> for IngestResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            total: report.total,
            succeeded: report.succeeded(),
            failed: report.failed(),
            outcome: report.outcome().as_str().to_string(),
            message: report.user_message(),
            item_ids: report.item_ids,
            failures: report.failures.into_iter().map(FileFailureDto::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_tells_a_null_end_date_from_a_missing_one() {
        let patch = |body: &str| {
            serde_json::from_str::<PatchTripRequest>(body)
                .unwrap()
                .into_patch()
                .unwrap()
        };
        assert_eq!(patch(r#"{"memberCount": 2}"#).end_date, None);
        assert_eq!(patch(r#"{"endDate": null}"#).end_date, Some(None));
        let set = patch(r#"{"endDate": "2025-02-01"}"#).end_date.unwrap().unwrap();
        assert_eq!(set.to_rfc3339(), "2025-02-01T00:00:00+00:00");
    }

    #[test]
    fn dates_accept_plain_days_and_rfc3339() {
        let day = parse_instant("2025-01-01", "startDate").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        let instant = parse_instant("2025-01-01T10:30:00+07:00", "startDate").unwrap();
        assert_eq!(instant.to_rfc3339(), "2025-01-01T03:30:00+00:00");
        assert!(parse_instant("next tuesday", "startDate").is_err());
    }

    #[test]
    fn item_request_is_permissive_about_enums() {
        let request = ItemRequest {
            name: Some("Street food".into()),
            category: Some("snacks".into()),
            item_type: Some("memory".into()),
            created_by: Some("u1".into()),
            amount: Some(30.0),
            ..ItemRequest::default()
        };
        let item = request.into_new_item(None).unwrap();
        assert_eq!(item.category, Category::Other);
        assert_eq!(item.item_type, ItemType::Memory);
        assert_eq!(item.amount, 0.0);
    }

    #[test]
    fn item_request_names_the_missing_field() {
        let request = ItemRequest {
            name: Some("Lunch".into()),
            item_type: Some("expense".into()),
            created_by: Some("u1".into()),
            ..ItemRequest::default()
        };
        let (_, body) = request.into_new_item(None).unwrap_err();
        assert_eq!(body.0.error, "Missing required field: category");
    }
}
