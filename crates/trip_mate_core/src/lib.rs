pub mod analysis;
pub mod cache;
pub mod deletion;
pub mod domain;
pub mod ingestion;
pub mod live;
pub mod memory;
pub mod paths;
pub mod ports;
pub mod view_model;

pub use deletion::{DeletionCoordinator, ReapReport, TripDeleteReport};
pub use domain::{
    AnalysisResult, Category, DeleteOutcome, ItemType, MediaKind, NewTrip, NewTripItem, Trip,
    TripItem, TripPatch, UploadedAsset, DEFAULT_TRIP_NAME,
};
pub use ingestion::{BatchOutcome, BatchReport, IngestionLimits, IngestionPipeline, SelectedFile};
pub use live::{Snapshot, Subscription, UnsubscribeHandle};
pub use ports::{
    AiGateway, AssetLedger, EncodedImage, ImageProcessor, ItemStore, ObjectStore, PortError,
    PortResult, TripStore,
};
pub use view_model::{GalleryStats, GalleryViewModel, PrimaryFilter};
