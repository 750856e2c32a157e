//! crates/trip_mate_core/src/memory.rs
//!
//! In-process implementations of the storage ports. They back the test suites
//! and local experiments, and honour the same contracts as the real adapters:
//! ordering, idempotent deletes, live snapshots, and `NotFound` for writes
//! under a missing trip. Failure switches let tests inject outages.

use crate::domain::{
    new_document_id, sort_newest_first, NewTrip, NewTripItem, Trip, TripItem, TripPatch,
};
use crate::live::{SnapshotHub, Subscription};
use crate::paths::path_under_base;
use crate::ports::{
    AssetLedger, ItemStore, ObjectStore, PendingAsset, PortError, PortResult, TripStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

//=========================================================================================
// Document Store
//=========================================================================================

#[derive(Default)]
struct DocumentState {
    trips: HashMap<String, Trip>,
    items: HashMap<String, HashMap<String, TripItem>>,
}

/// Trips and their item subcollections held in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<DocumentState>,
    live: SnapshotHub<TripItem>,
    unavailable: AtomicBool,
    fail_item_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes item creation and overwrite fail with `StoreUnavailable`.
    pub fn fail_item_writes(&self, fail: bool) {
        self.fail_item_writes.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PortError::StoreUnavailable("document store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_item_write(&self) -> PortResult<()> {
        self.check_available()?;
        if self.fail_item_writes.load(Ordering::SeqCst) {
            Err(PortError::StoreUnavailable("item write rejected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn publish(&self, trip_id: &str) {
        self.live.refresh(trip_id, || self.list_items(trip_id)).await;
    }
}

#[async_trait]
impl TripStore for MemoryDocumentStore {
    async fn list_trips(&self, owner: &str) -> PortResult<Vec<Trip>> {
        self.check_available()?;
        let state = lock(&self.state);
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| t.created_by == owner)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(trips)
    }

    async fn get_trip(&self, trip_id: &str) -> PortResult<Trip> {
        self.check_available()?;
        lock(&self.state)
            .trips
            .get(trip_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Trip {} not found", trip_id)))
    }

    async fn find_trip_by_name(&self, owner: &str, trip_name: &str) -> PortResult<Option<Trip>> {
        self.check_available()?;
        let state = lock(&self.state);
        Ok(state
            .trips
            .values()
            .filter(|t| t.created_by == owner && t.trip_name == trip_name)
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned())
    }

    async fn create_trip(&self, trip: NewTrip) -> PortResult<Trip> {
        self.check_available()?;
        let now = Utc::now();
        let created = Trip {
            id: new_document_id(),
            trip_name: trip.trip_name,
            total_budget: trip.total_budget,
            start_date: trip.start_date,
            end_date: trip.end_date,
            currency: trip.currency,
            member_count: trip.member_count,
            created_by: trip.created_by,
            created_at: now,
            updated_at: now,
        };
        lock(&self.state)
            .trips
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn patch_trip(&self, trip_id: &str, patch: TripPatch) -> PortResult<Trip> {
        self.check_available()?;
        let mut state = lock(&self.state);
        let trip = state
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| PortError::NotFound(format!("Trip {} not found", trip_id)))?;
        patch.apply_to(trip);
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }

    async fn delete_trip(&self, trip_id: &str) -> PortResult<bool> {
        self.check_available()?;
        let existed = {
            let mut state = lock(&self.state);
            state.items.remove(trip_id);
            state.trips.remove(trip_id).is_some()
        };
        self.publish(trip_id).await;
        self.live.forget(trip_id);
        Ok(existed)
    }
}

#[async_trait]
impl ItemStore for MemoryDocumentStore {
    async fn create_item(&self, trip_id: &str, item: NewTripItem) -> PortResult<TripItem> {
        self.check_item_write()?;
        let created = {
            let mut state = lock(&self.state);
            if !state.trips.contains_key(trip_id) {
                return Err(PortError::NotFound(format!("Trip {} not found", trip_id)));
            }
            let now = Utc::now();
            let created = TripItem {
                id: new_document_id(),
                trip_id: trip_id.to_string(),
                name: item.name,
                amount: item.amount,
                category: item.category,
                item_type: item.item_type,
                image_url: item.image_url,
                thumbnail_url: item.thumbnail_url,
                blur_data_url: item.blur_data_url,
                video_url: item.video_url,
                images: item.images,
                description: item.description,
                created_by: item.created_by,
                timestamp: item.timestamp.unwrap_or(now),
                created_at: now,
                updated_at: now,
            };
            state
                .items
                .entry(trip_id.to_string())
                .or_default()
                .insert(created.id.clone(), created.clone());
            created
        };
        self.publish(trip_id).await;
        Ok(created)
    }

    async fn list_items(&self, trip_id: &str) -> PortResult<Vec<TripItem>> {
        self.check_available()?;
        let mut items: Vec<TripItem> = lock(&self.state)
            .items
            .get(trip_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn get_item(&self, trip_id: &str, item_id: &str) -> PortResult<Option<TripItem>> {
        self.check_available()?;
        Ok(lock(&self.state)
            .items
            .get(trip_id)
            .and_then(|items| items.get(item_id))
            .cloned())
    }

    async fn replace_item(
        &self,
        trip_id: &str,
        item_id: &str,
        item: NewTripItem,
    ) -> PortResult<TripItem> {
        self.check_item_write()?;
        let replaced = {
            let mut state = lock(&self.state);
            let existing = state
                .items
                .get_mut(trip_id)
                .and_then(|items| items.get_mut(item_id))
                .ok_or_else(|| PortError::NotFound(format!("Item {} not found", item_id)))?;
            existing.name = item.name;
            existing.amount = item.amount;
            existing.category = item.category;
            existing.item_type = item.item_type;
            existing.image_url = item.image_url;
            existing.thumbnail_url = item.thumbnail_url;
            existing.blur_data_url = item.blur_data_url;
            existing.video_url = item.video_url;
            existing.images = item.images;
            existing.description = item.description;
            if let Some(timestamp) = item.timestamp {
                existing.timestamp = timestamp;
            }
            existing.updated_at = Utc::now();
            existing.clone()
        };
        self.publish(trip_id).await;
        Ok(replaced)
    }

    async fn delete_item(&self, trip_id: &str, item_id: &str) -> PortResult<bool> {
        self.check_available()?;
        let removed = lock(&self.state)
            .items
            .get_mut(trip_id)
            .and_then(|items| items.remove(item_id))
            .is_some();
        if removed {
            self.publish(trip_id).await;
        }
        Ok(removed)
    }

    async fn subscribe(&self, trip_id: &str) -> PortResult<Subscription<TripItem>> {
        self.check_available()?;
        self.live.subscribe(trip_id, || self.list_items(trip_id)).await
    }
}

//=========================================================================================
// Object Store
//=========================================================================================

pub const MEMORY_OBJECT_BASE: &str = "memory://objects";

/// Blobs held in memory, addressed as `memory://objects/{path}`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        lock(&self.objects).get(path).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(PortError::UploadFailed(format!("upload of {} rejected", path)));
        }
        lock(&self.objects).insert(path.to_string(), (data, content_type.to_string()));
        Ok(format!("{}/{}", MEMORY_OBJECT_BASE, path))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(PortError::StoreUnavailable(format!("delete of {} rejected", path)));
        }
        lock(&self.objects).remove(path);
        Ok(())
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        path_under_base(url, MEMORY_OBJECT_BASE)
    }
}

//=========================================================================================
// Asset Ledger
//=========================================================================================

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<BTreeMap<String, PendingAsset>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetLedger for MemoryLedger {
    async fn record(&self, path: &str, reason: &str) -> PortResult<()> {
        lock(&self.entries).insert(
            path.to_string(),
            PendingAsset {
                path: path.to_string(),
                reason: reason.to_string(),
                recorded_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn pending(&self, limit: usize) -> PortResult<Vec<PendingAsset>> {
        let mut entries: Vec<PendingAsset> = lock(&self.entries).values().cloned().collect();
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn clear(&self, path: &str) -> PortResult<()> {
        lock(&self.entries).remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ItemType};
    use chrono::{Duration, TimeZone};

    async fn store_with_trip() -> (MemoryDocumentStore, String) {
        let store = MemoryDocumentStore::new();
        let trip = store
            .create_trip(NewTrip::default_for("u1", Utc::now()))
            .await
            .unwrap();
        (store, trip.id)
    }

    #[tokio::test]
    async fn empty_trip_lists_nothing() {
        let (store, trip_id) = store_with_trip().await;
        assert!(store.list_items(&trip_id).await.unwrap().is_empty());
        assert!(store.list_items("no-such-trip").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn items_come_back_newest_event_first() {
        let (store, trip_id) = store_with_trip().await;
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        for (name, offset) in [("b", 1), ("c", 2), ("a", 0)] {
            let mut item = NewTripItem::new(name, Category::Food, ItemType::Expense, "u1");
            item.timestamp = Some(base + Duration::hours(offset));
            store.create_item(&trip_id, item).await.unwrap();
        }
        let names: Vec<String> = store
            .list_items(&trip_id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn create_under_missing_trip_is_not_found() {
        let store = MemoryDocumentStore::new();
        let item = NewTripItem::new("x", Category::Other, ItemType::Memory, "u1");
        assert!(matches!(
            store.create_item("ghost", item).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_stamps_timestamps_and_keeps_amount() {
        let (store, trip_id) = store_with_trip().await;
        let mut item = NewTripItem::new("Lunch", Category::Food, ItemType::Expense, "u1");
        item.amount = 100.0;
        let created = store.create_item(&trip_id, item).await.unwrap();
        assert_eq!(created.amount, 100.0);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.timestamp, created.created_at);
        assert!(!created.id.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_additions_and_removals() {
        let (store, trip_id) = store_with_trip().await;
        let mut a = store.subscribe(&trip_id).await.unwrap();
        let mut b = store.subscribe(&trip_id).await.unwrap();
        assert!(a.next().await.unwrap().is_empty());
        assert!(b.next().await.unwrap().is_empty());

        let item = store
            .create_item(
                &trip_id,
                NewTripItem::new("Sunset", Category::Scenery, ItemType::Memory, "u1"),
            )
            .await
            .unwrap();
        assert_eq!(a.next().await.unwrap().len(), 1);
        assert_eq!(b.next().await.unwrap()[0].id, item.id);

        assert!(store.delete_item(&trip_id, &item.id).await.unwrap());
        assert!(!store.delete_item(&trip_id, &item.id).await.unwrap());
        assert!(a.next().await.unwrap().is_empty());
        assert!(b.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outage_surfaces_as_store_unavailable() {
        let (store, trip_id) = store_with_trip().await;
        store.set_unavailable(true);
        assert!(matches!(
            store.list_items(&trip_id).await,
            Err(PortError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn patch_keeps_owner_and_bumps_updated_at() {
        let (store, trip_id) = store_with_trip().await;
        let before = store.get_trip(&trip_id).await.unwrap();
        let patch = TripPatch {
            member_count: Some(0),
            ..TripPatch::default()
        };
        let after = store.patch_trip(&trip_id, patch).await.unwrap();
        assert_eq!(after.created_by, before.created_by);
        assert_eq!(after.member_count, 0);
        assert_eq!(after.effective_member_count(), 1);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn patch_can_set_and_clear_the_end_date() {
        let (store, trip_id) = store_with_trip().await;
        let end = Utc::now();
        let set = TripPatch {
            end_date: Some(Some(end)),
            ..TripPatch::default()
        };
        assert_eq!(store.patch_trip(&trip_id, set).await.unwrap().end_date, Some(end));

        let untouched = TripPatch {
            member_count: Some(3),
            ..TripPatch::default()
        };
        assert_eq!(store.patch_trip(&trip_id, untouched).await.unwrap().end_date, Some(end));

        let cleared = TripPatch {
            end_date: Some(None),
            ..TripPatch::default()
        };
        assert_eq!(store.patch_trip(&trip_id, cleared).await.unwrap().end_date, None);
    }
}
