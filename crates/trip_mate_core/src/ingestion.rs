//! crates/trip_mate_core/src/ingestion.rs
//!
//! Turns selected local files into persisted trip items.
//!
//! Per file: size check → (images) compress → classify → upload original,
//! thumbnail and inline blur placeholder → write the item document. Videos skip
//! compression and classification. A batch runs its files one after another and
//! a failing file never stops the rest.

use crate::analysis::analyze_image;
use crate::deletion::DeletionCoordinator;
use crate::domain::{Category, ItemType, MediaKind, NewTripItem, UploadedAsset};
use crate::paths::{asset_paths, PathStamper};
use crate::ports::{AiGateway, EncodedImage, ImageProcessor, ItemStore, ObjectStore, PortError, PortResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 500 * 1024 * 1024;

/// Independent size ceilings per media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionLimits {
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
}

impl Default for IngestionLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
        }
    }
}

impl IngestionLimits {
    pub fn ceiling_for(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.max_image_bytes,
            MediaKind::Video => self.max_video_bytes,
        }
    }
}

/// One file picked by the user.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

//=========================================================================================
// Batch Reporting
//=========================================================================================

/// The pipeline stage at which a file was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SizeValidation,
    Classification,
    AssetUpload,
    DocumentPersist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SizeValidation => "size_validation",
            Stage::Classification => "classification",
            Stage::AssetUpload => "asset_upload",
            Stage::DocumentPersist => "document_persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub file_name: String,
    pub stage: Stage,
    pub message: String,
}

/// Progress after each finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    AllSucceeded,
    PartialFailure { succeeded: usize, failed: usize },
    AllFailed,
}

impl BatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOutcome::AllSucceeded => "all_succeeded",
            BatchOutcome::PartialFailure { .. } => "partial_failure",
            BatchOutcome::AllFailed => "all_failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub item_ids: Vec<String>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.item_ids.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn outcome(&self) -> BatchOutcome {
        match (self.succeeded(), self.failed()) {
            (_, 0) => BatchOutcome::AllSucceeded,
            (0, _) => BatchOutcome::AllFailed,
            (succeeded, failed) => BatchOutcome::PartialFailure { succeeded, failed },
        }
    }

    /// Short, casual summary for a toast.
    pub fn user_message(&self) -> String {
        match self.outcome() {
            BatchOutcome::AllSucceeded if self.total == 0 => "Nothing to upload.".to_string(),
            BatchOutcome::AllSucceeded => format!("Done! Saved {} file(s).", self.succeeded()),
            BatchOutcome::PartialFailure { succeeded, failed } => {
                format!("Saved {}, but {} file(s) didn't make it.", succeeded, failed)
            }
            BatchOutcome::AllFailed => format!(
                "Oops, none of the {} file(s) could be saved. Try again?",
                self.total
            ),
        }
    }
}

//=========================================================================================
// Pipeline
//=========================================================================================

pub struct IngestionPipeline {
    items: Arc<dyn ItemStore>,
    objects: Arc<dyn ObjectStore>,
    gateway: Arc<dyn AiGateway>,
    imaging: Arc<dyn ImageProcessor>,
    deleter: DeletionCoordinator,
    limits: IngestionLimits,
    stamper: PathStamper,
}

impl IngestionPipeline {
    pub fn new(
        items: Arc<dyn ItemStore>,
        objects: Arc<dyn ObjectStore>,
        gateway: Arc<dyn AiGateway>,
        imaging: Arc<dyn ImageProcessor>,
        deleter: DeletionCoordinator,
        limits: IngestionLimits,
    ) -> Self {
        Self {
            items,
            objects,
            gateway,
            imaging,
            deleter,
            limits,
            stamper: PathStamper::new(),
        }
    }

    pub fn limits(&self) -> IngestionLimits {
        self.limits
    }

    /// Checks the MIME type and the per-kind ceiling. No I/O happens here.
    pub fn validate(&self, content_type: &str, size: u64) -> PortResult<MediaKind> {
        let kind = MediaKind::from_content_type(content_type).ok_or_else(|| {
            PortError::Validation("Only image and video files are allowed".to_string())
        })?;
        let ceiling = self.limits.ceiling_for(kind);
        if size > ceiling {
            return Err(PortError::Validation(format!(
                "File size exceeds the {}MB limit",
                ceiling / (1024 * 1024)
            )));
        }
        Ok(kind)
    }

    /// Stores the original and, for images, a thumbnail and blur placeholder.
    /// Thumbnail problems never block the original: the original stands in.
    pub async fn upload_asset(
        &self,
        trip_id: &str,
        file: &SelectedFile,
        kind: MediaKind,
    ) -> PortResult<UploadedAsset> {
        let paths = asset_paths(trip_id, self.stamper.next_stamp(), &file.file_name);
        let url = self
            .objects
            .upload(&paths.original, file.data.clone(), &file.content_type)
            .await?;

        let mut asset = UploadedAsset {
            url: url.clone(),
            path: paths.original,
            thumbnail_url: url,
            thumbnail_path: None,
            blur_data_url: None,
            name: file.file_name.clone(),
            size: file.size(),
            content_type: file.content_type.clone(),
            kind,
        };
        if kind == MediaKind::Video {
            return Ok(asset);
        }

        match self.imaging.thumbnail(file.data.clone()).await {
            Ok(thumb) => match self
                .objects
                .upload(&paths.thumbnail, thumb.data, &thumb.content_type)
                .await
            {
                Ok(thumb_url) => {
                    asset.thumbnail_url = thumb_url;
                    asset.thumbnail_path = Some(paths.thumbnail);
                }
                Err(e) => warn!(path = %paths.thumbnail, error = %e, "thumbnail upload failed, using original"),
            },
            Err(e) => warn!(file = %file.file_name, error = %e, "thumbnail generation failed, using original"),
        }

        match self.imaging.blur_placeholder(file.data.clone()).await {
            Ok(data_url) => asset.blur_data_url = Some(data_url),
            Err(e) => warn!(file = %file.file_name, error = %e, "blur placeholder generation failed"),
        }

        Ok(asset)
    }

    async fn compress_or_original(&self, file: &SelectedFile) -> SelectedFile {
        match self.imaging.compress(file.data.clone(), &file.content_type).await {
            Ok(EncodedImage { data, content_type }) => SelectedFile {
                file_name: file.file_name.clone(),
                content_type,
                data,
            },
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "compression failed, keeping original bytes");
                file.clone()
            }
        }
    }

    /// Runs one file end to end and returns the new item's identifier.
    pub async fn ingest_file(
        &self,
        trip_id: &str,
        created_by: &str,
        file: &SelectedFile,
    ) -> Result<String, FileFailure> {
        let fail = |stage: Stage, e: PortError| FileFailure {
            file_name: file.file_name.clone(),
            stage,
            message: e.to_string(),
        };

        let kind = self
            .validate(&file.content_type, file.size())
            .map_err(|e| fail(Stage::SizeValidation, e))?;

        let (payload, item) = match kind {
            MediaKind::Image => {
                let compressed = self.compress_or_original(file).await;
                let encoded = STANDARD.encode(&compressed.data);
                let analysis = analyze_image(self.gateway.as_ref(), &encoded, &compressed.content_type)
                    .await
                    .map_err(|e| fail(Stage::Classification, e))?;
                let mut item = NewTripItem::new(
                    &analysis.name,
                    analysis.category,
                    analysis.item_type,
                    created_by,
                );
                item.amount = analysis.amount;
                item.description = analysis.description;
                (compressed, item)
            }
            MediaKind::Video => {
                let item = NewTripItem::new(&file.file_name, Category::Video, ItemType::Memory, created_by);
                (file.clone(), item)
            }
        };

        let asset = self
            .upload_asset(trip_id, &payload, kind)
            .await
            .map_err(|e| fail(Stage::AssetUpload, e))?;

        let mut item = item;
        match kind {
            MediaKind::Image => {
                item.image_url = Some(asset.url.clone());
                item.thumbnail_url = Some(asset.thumbnail_url.clone());
                item.blur_data_url = asset.blur_data_url.clone();
            }
            MediaKind::Video => item.video_url = Some(asset.url.clone()),
        }

        match self.items.create_item(trip_id, item.normalized()).await {
            Ok(created) => Ok(created.id),
            Err(e) => {
                error!(trip_id, file = %file.file_name, error = %e, "item write failed, removing uploaded assets");
                self.deleter.release_paths(&asset.stored_paths()).await;
                Err(fail(Stage::DocumentPersist, e))
            }
        }
    }

    /// Processes `files` sequentially, reporting `(current, total)` after each.
    pub async fn ingest_batch<F>(
        &self,
        trip_id: &str,
        created_by: &str,
        files: &[SelectedFile],
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress) + Send,
    {
        let mut report = BatchReport {
            total: files.len(),
            ..BatchReport::default()
        };
        for (index, file) in files.iter().enumerate() {
            match self.ingest_file(trip_id, created_by, file).await {
                Ok(item_id) => report.item_ids.push(item_id),
                Err(failure) => {
                    warn!(
                        trip_id,
                        file = %failure.file_name,
                        stage = %failure.stage,
                        error = %failure.message,
                        "file skipped"
                    );
                    report.failures.push(failure);
                }
            }
            let progress = BatchProgress {
                current: index + 1,
                total: files.len(),
            };
            info!(trip_id, current = progress.current, total = progress.total, "ingestion progress");
            on_progress(progress);
        }
        report
    }
}
