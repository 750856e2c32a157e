//! crates/trip_mate_core/src/deletion.rs
//!
//! Consistent-as-possible deletion across the document store and the object
//! store, which share no transactions.
//!
//! Items are deleted blobs-first, document-second. A blob that will not go away
//! is parked in the `AssetLedger` and reported back as orphaned; the delete
//! itself still succeeds. The reaper drains the ledger later.

use crate::domain::{DeleteOutcome, TripItem};
use crate::ports::{AssetLedger, ItemStore, ObjectStore, PortResult, TripStore};
use std::sync::Arc;
use tracing::{error, info, warn};

const BLOB_DELETE_ATTEMPTS: usize = 2;

/// Summary of a cascading trip deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripDeleteReport {
    pub trip_existed: bool,
    pub items_deleted: usize,
    pub orphaned_assets: Vec<String>,
}

/// Summary of one reaper pass over the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub attempted: usize,
    pub cleared: usize,
}

#[derive(Clone)]
pub struct DeletionCoordinator {
    trips: Arc<dyn TripStore>,
    items: Arc<dyn ItemStore>,
    objects: Arc<dyn ObjectStore>,
    ledger: Arc<dyn AssetLedger>,
}

impl DeletionCoordinator {
    pub fn new(
        trips: Arc<dyn TripStore>,
        items: Arc<dyn ItemStore>,
        objects: Arc<dyn ObjectStore>,
        ledger: Arc<dyn AssetLedger>,
    ) -> Self {
        Self {
            trips,
            items,
            objects,
            ledger,
        }
    }

    /// Deletes one item and its blobs. Deleting a missing item succeeds with
    /// `already_deleted` set, so retries never fail.
    pub async fn delete_item(&self, trip_id: &str, item_id: &str) -> PortResult<DeleteOutcome> {
        let Some(item) = self.items.get_item(trip_id, item_id).await? else {
            info!(trip_id, item_id, "item not found, treating as already deleted");
            return Ok(DeleteOutcome::already_gone());
        };

        let orphaned_assets = self.delete_item_assets(&item).await;
        let deleted_now = self.items.delete_item(trip_id, item_id).await?;
        if !orphaned_assets.is_empty() {
            warn!(
                trip_id,
                item_id,
                orphaned = orphaned_assets.len(),
                "item deleted but some assets remain"
            );
        }

        Ok(DeleteOutcome {
            already_deleted: !deleted_now,
            orphaned_assets,
        })
    }

    async fn delete_item_assets(&self, item: &TripItem) -> Vec<String> {
        let mut paths = Vec::new();
        for url in item.asset_urls() {
            match self.objects.path_for_url(url) {
                Some(path) => paths.push(path),
                None => warn!(item_id = %item.id, url, "asset URL is not managed by the object store, skipping"),
            }
        }
        self.release_paths(&paths).await
    }

    /// Best-effort removal of blobs. Returns the paths that could not be
    /// deleted; each of them has been recorded in the ledger.
    pub async fn release_paths(&self, paths: &[String]) -> Vec<String> {
        let mut orphaned = Vec::new();
        for path in paths {
            if let Err(e) = self.delete_blob(path).await {
                error!(path = %path, error = %e, "failed to delete asset, parking it for the reaper");
                if let Err(ledger_err) = self.ledger.record(path, &e.to_string()).await {
                    error!(path = %path, error = %ledger_err, "failed to record orphaned asset");
                }
                orphaned.push(path.clone());
            }
        }
        orphaned
    }

    async fn delete_blob(&self, path: &str) -> PortResult<()> {
        let mut attempt = 1;
        loop {
            match self.objects.delete(path).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < BLOB_DELETE_ATTEMPTS => {
                    warn!(path, attempt, error = %e, "asset delete failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Deletes every item (with its blobs) and then the trip document.
    /// Not atomic: a failure midway leaves the remaining items in place.
    pub async fn delete_trip(&self, trip_id: &str) -> PortResult<TripDeleteReport> {
        let items = self.items.list_items(trip_id).await?;
        let mut report = TripDeleteReport::default();
        for item in &items {
            let outcome = self.delete_item(trip_id, &item.id).await?;
            if !outcome.already_deleted {
                report.items_deleted += 1;
            }
            report.orphaned_assets.extend(outcome.orphaned_assets);
        }
        report.trip_existed = self.trips.delete_trip(trip_id).await?;
        info!(
            trip_id,
            items = report.items_deleted,
            existed = report.trip_existed,
            "trip deleted"
        );
        Ok(report)
    }

    /// Retries up to `limit` parked blobs and clears the ones that are gone.
    pub async fn reap(&self, limit: usize) -> PortResult<ReapReport> {
        let pending = self.ledger.pending(limit).await?;
        let mut report = ReapReport {
            attempted: pending.len(),
            cleared: 0,
        };
        for entry in pending {
            match self.objects.delete(&entry.path).await {
                Ok(()) => {
                    self.ledger.clear(&entry.path).await?;
                    report.cleared += 1;
                }
                Err(e) => warn!(path = %entry.path, error = %e, "orphaned asset still not deletable"),
            }
        }
        if report.attempted > 0 {
            info!(attempted = report.attempted, cleared = report.cleared, "reaper pass finished");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ItemType, NewTrip, NewTripItem};
    use crate::memory::{MemoryDocumentStore, MemoryLedger, MemoryObjectStore};
    use bytes::Bytes;
    use chrono::Utc;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        objects: Arc<MemoryObjectStore>,
        ledger: Arc<MemoryLedger>,
        coordinator: DeletionCoordinator,
        trip_id: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let coordinator = DeletionCoordinator::new(
            store.clone(),
            store.clone(),
            objects.clone(),
            ledger.clone(),
        );
        let trip = store
            .create_trip(NewTrip::default_for("u1", Utc::now()))
            .await
            .unwrap();
        Fixture {
            store,
            objects,
            ledger,
            coordinator,
            trip_id: trip.id,
        }
    }

    async fn item_with_image(fx: &Fixture) -> String {
        let url = fx
            .objects
            .upload("trips/t/items/1_a.jpg", Bytes::from_static(b"img"), "image/jpeg")
            .await
            .unwrap();
        let thumb = fx
            .objects
            .upload("trips/t/items/1_thumb_a.jpg", Bytes::from_static(b"th"), "image/webp")
            .await
            .unwrap();
        let mut item = NewTripItem::new("Lunch", Category::Food, ItemType::Expense, "u1");
        item.image_url = Some(url);
        item.thumbnail_url = Some(thumb);
        fx.store.create_item(&fx.trip_id, item).await.unwrap().id
    }

    #[tokio::test]
    async fn second_delete_reports_already_deleted() {
        let fx = fixture().await;
        let item_id = item_with_image(&fx).await;

        let first = fx.coordinator.delete_item(&fx.trip_id, &item_id).await.unwrap();
        assert!(!first.already_deleted);
        assert!(!first.is_partial());
        assert_eq!(fx.objects.len(), 0);

        let second = fx.coordinator.delete_item(&fx.trip_id, &item_id).await.unwrap();
        assert!(second.already_deleted);
    }

    #[tokio::test]
    async fn nonexistent_item_is_a_successful_noop() {
        let fx = fixture().await;
        let outcome = fx.coordinator.delete_item(&fx.trip_id, "nonexistent").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::already_gone());
    }

    #[tokio::test]
    async fn stuck_blob_is_reported_and_parked() {
        let fx = fixture().await;
        let item_id = item_with_image(&fx).await;
        fx.objects.fail_deletes(true);

        let outcome = fx.coordinator.delete_item(&fx.trip_id, &item_id).await.unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.orphaned_assets.len(), 2);
        assert!(fx.store.get_item(&fx.trip_id, &item_id).await.unwrap().is_none());
        assert_eq!(fx.ledger.pending(10).await.unwrap().len(), 2);

        fx.objects.fail_deletes(false);
        let reaped = fx.coordinator.reap(10).await.unwrap();
        assert_eq!(reaped, ReapReport { attempted: 2, cleared: 2 });
        assert!(fx.ledger.pending(10).await.unwrap().is_empty());
        assert_eq!(fx.objects.len(), 0);
    }

    #[tokio::test]
    async fn trip_delete_cascades_items_then_trip() {
        let fx = fixture().await;
        item_with_image(&fx).await;
        fx.store
            .create_item(
                &fx.trip_id,
                NewTripItem::new("Note", Category::Memory, ItemType::Memory, "u1"),
            )
            .await
            .unwrap();

        let report = fx.coordinator.delete_trip(&fx.trip_id).await.unwrap();
        assert!(report.trip_existed);
        assert_eq!(report.items_deleted, 2);
        assert!(fx.store.list_items(&fx.trip_id).await.unwrap().is_empty());
        assert!(fx.store.get_trip(&fx.trip_id).await.is_err());

        let again = fx.coordinator.delete_trip(&fx.trip_id).await.unwrap();
        assert!(!again.trip_existed);
    }
}
