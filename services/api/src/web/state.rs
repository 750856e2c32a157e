//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::fetcher::{AssetFetcher, FetchedAsset};
use std::sync::{Arc, Mutex};
use trip_mate_core::cache::LruCache;
use trip_mate_core::deletion::DeletionCoordinator;
use trip_mate_core::ingestion::{IngestionLimits, IngestionPipeline};
use trip_mate_core::ports::{
    AiGateway, AssetLedger, ImageProcessor, ItemStore, ObjectStore, TripStore,
};

/// The concrete collaborators the service is wired with.
#[derive(Clone)]
pub struct Ports {
    pub trips: Arc<dyn TripStore>,
    pub items: Arc<dyn ItemStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ledger: Arc<dyn AssetLedger>,
    pub ai: Arc<dyn AiGateway>,
    pub imaging: Arc<dyn ImageProcessor>,
    pub fetcher: Arc<dyn AssetFetcher>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub trips: Arc<dyn TripStore>,
    pub items: Arc<dyn ItemStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ai: Arc<dyn AiGateway>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub ingestion: IngestionPipeline,
    pub deleter: DeletionCoordinator,
    /// Recently proxied downloads keyed by URL.
    pub download_cache: Mutex<LruCache<String, FetchedAsset>>,
}

impl AppState {
    pub fn new(ports: Ports, limits: IngestionLimits, download_cache_entries: usize) -> Self {
        let deleter = DeletionCoordinator::new(
            ports.trips.clone(),
            ports.items.clone(),
            ports.objects.clone(),
            ports.ledger,
        );
        let ingestion = IngestionPipeline::new(
            ports.items.clone(),
            ports.objects.clone(),
            ports.ai.clone(),
            ports.imaging,
            deleter.clone(),
            limits,
        );
        Self {
            trips: ports.trips,
            items: ports.items,
            objects: ports.objects,
            ai: ports.ai,
            fetcher: ports.fetcher,
            ingestion,
            deleter,
            download_cache: Mutex::new(LruCache::new(download_cache_entries)),
        }
    }

    pub fn limits(&self) -> IngestionLimits {
        self.ingestion.limits()
    }

    /// Request body ceiling: the largest upload plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        let limits = self.limits();
        let largest = limits.max_image_bytes.max(limits.max_video_bytes);
        usize::try_from(largest)
            .unwrap_or(usize::MAX)
            .saturating_add(1024 * 1024)
    }
}
