//! crates/trip_mate_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, object store and AI vendor.

use crate::domain::{NewTrip, NewTripItem, Trip, TripItem, TripPatch};
use crate::live::Subscription;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Document Store Ports
//=========================================================================================

#[async_trait]
pub trait TripStore: Send + Sync {
    /// All trips owned by `owner`, newest first.
    async fn list_trips(&self, owner: &str) -> PortResult<Vec<Trip>>;

    async fn get_trip(&self, trip_id: &str) -> PortResult<Trip>;

    async fn find_trip_by_name(&self, owner: &str, trip_name: &str) -> PortResult<Option<Trip>>;

    async fn create_trip(&self, trip: NewTrip) -> PortResult<Trip>;

    async fn patch_trip(&self, trip_id: &str, patch: TripPatch) -> PortResult<Trip>;

    /// Removes only the trip document. Returns `false` if it did not exist.
    async fn delete_trip(&self, trip_id: &str) -> PortResult<bool>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Appends an item under the trip. Fails with `NotFound` if the trip is absent.
    async fn create_item(&self, trip_id: &str, item: NewTripItem) -> PortResult<TripItem>;

    /// All items of a trip ordered by event timestamp, most recent first.
    async fn list_items(&self, trip_id: &str) -> PortResult<Vec<TripItem>>;

    async fn get_item(&self, trip_id: &str, item_id: &str) -> PortResult<Option<TripItem>>;

    /// Full-document overwrite of the editable fields.
    async fn replace_item(
        &self,
        trip_id: &str,
        item_id: &str,
        item: NewTripItem,
    ) -> PortResult<TripItem>;

    /// Returns `true` if the document was deleted now, `false` if it was already gone.
    async fn delete_item(&self, trip_id: &str, item_id: &str) -> PortResult<bool>;

    /// Live feed of full ordered snapshots, starting with the current one.
    async fn subscribe(&self, trip_id: &str) -> PortResult<Subscription<TripItem>>;
}

//=========================================================================================
// Object Store Port
//=========================================================================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` at `path` and returns a stable retrieval URL.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<String>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> PortResult<()>;

    /// Maps a retrieval URL produced by this store back to its path.
    fn path_for_url(&self, url: &str) -> Option<String>;
}

/// A blob that could not be deleted and awaits a retry.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAsset {
    pub path: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Compensating-action log for blobs that outlived their documents.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn record(&self, path: &str, reason: &str) -> PortResult<()>;

    async fn pending(&self, limit: usize) -> PortResult<Vec<PendingAsset>>;

    async fn clear(&self, path: &str) -> PortResult<()>;
}

//=========================================================================================
// AI Gateway Port
//=========================================================================================

#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Sends a base64 image to the vision model and returns its raw text reply.
    async fn analyze_image_raw(&self, base64_data: &str, mime_type: &str) -> PortResult<String>;

    /// Produces a short free-text commentary on a list of expense records.
    async fn summarize_expenses(&self, expenses_json: &str) -> PortResult<String>;
}

//=========================================================================================
// Image Processing Port
//=========================================================================================

/// Re-encoded image bytes together with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Re-encodes an image bounded by a maximum dimension, keeping its aspect ratio.
    async fn compress(&self, data: Bytes, content_type: &str) -> PortResult<EncodedImage>;

    /// A small grid thumbnail in a compact format.
    async fn thumbnail(&self, data: Bytes) -> PortResult<EncodedImage>;

    /// A tiny preview encoded inline as a `data:` URL.
    async fn blur_placeholder(&self, data: Bytes) -> PortResult<String>;
}
