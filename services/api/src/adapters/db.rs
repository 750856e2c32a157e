//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `TripStore`, `ItemStore` and `AssetLedger` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.
//!
//! Live item feeds are published from this process after each successful write,
//! so subscribers see the mutations made through this instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use trip_mate_core::domain::{
    new_document_id, Category, ItemType, NewTrip, NewTripItem, Trip, TripItem, TripPatch,
};
use trip_mate_core::live::{SnapshotHub, Subscription};
use trip_mate_core::ports::{
    AssetLedger, ItemStore, PendingAsset, PortError, PortResult, TripStore,
};

/// Postgres error code for a foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

const TRIP_COLUMNS: &str = "id, trip_name, total_budget, start_date, end_date, currency, \
     member_count, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, trip_id, name, amount, category, item_type, image_url, \
     thumbnail_url, blur_data_url, video_url, images, description, created_by, \
     \"timestamp\", created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter backing trips, items and the pending-deletion ledger.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    live: Arc<SnapshotHub<TripItem>>,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            live: Arc::new(SnapshotHub::new()),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn publish(&self, trip_id: &str) {
        self.live.refresh(trip_id, || self.list_items(trip_id)).await;
    }
}

/// Connectivity problems become `StoreUnavailable`.
fn store_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PortError::StoreUnavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// An item insert that trips the foreign key names a trip that does not exist.
fn item_write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            PortError::NotFound("Trip not found".to_string())
        }
        _ => store_error(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct TripRecord {
    id: String,
    trip_name: String,
    total_budget: f64,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    currency: String,
    member_count: i64,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl TripRecord {
    fn to_domain(self) -> Trip {
        Trip {
            id: self.id,
            trip_name: self.trip_name,
            total_budget: self.total_budget,
            start_date: self.start_date,
            end_date: self.end_date,
            currency: self.currency,
            member_count: self.member_count,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ItemRecord {
    id: String,
    trip_id: String,
    name: String,
    amount: f64,
    category: String,
    item_type: String,
    image_url: Option<String>,
    thumbnail_url: Option<String>,
    blur_data_url: Option<String>,
    video_url: Option<String>,
    images: Vec<String>,
    description: String,
    created_by: String,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ItemRecord {
    fn to_domain(self) -> TripItem {
        TripItem {
            id: self.id,
            trip_id: self.trip_id,
            name: self.name,
            amount: self.amount,
            category: Category::from_str_lossy(&self.category),
            item_type: ItemType::from_str_lossy(&self.item_type),
            image_url: self.image_url,
            thumbnail_url: self.thumbnail_url,
            blur_data_url: self.blur_data_url,
            video_url: self.video_url,
            images: self.images,
            description: self.description,
            created_by: self.created_by,
            timestamp: self.timestamp,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PendingAssetRecord {
    path: String,
    reason: String,
    recorded_at: DateTime<Utc>,
}
impl PendingAssetRecord {
    fn to_domain(self) -> PendingAsset {
        PendingAsset {
            path: self.path,
            reason: self.reason,
            recorded_at: self.recorded_at,
        }
    }
}

//=========================================================================================
// `TripStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TripStore for DbAdapter {
    async fn list_trips(&self, owner: &str) -> PortResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {} FROM trips WHERE created_by = $1 ORDER BY created_at DESC, id DESC",
            TRIP_COLUMNS
        );
        let records = sqlx::query_as::<_, TripRecord>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(records.into_iter().map(TripRecord::to_domain).collect())
    }

    async fn get_trip(&self, trip_id: &str) -> PortResult<Trip> {
        let sql = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
        sqlx::query_as::<_, TripRecord>(&sql)
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .map(TripRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Trip {} not found", trip_id)))
    }

    async fn find_trip_by_name(&self, owner: &str, trip_name: &str) -> PortResult<Option<Trip>> {
        let sql = format!(
            "SELECT {} FROM trips WHERE created_by = $1 AND trip_name = $2 \
             ORDER BY created_at ASC LIMIT 1",
            TRIP_COLUMNS
        );
        let record = sqlx::query_as::<_, TripRecord>(&sql)
            .bind(owner)
            .bind(trip_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.map(TripRecord::to_domain))
    }

    async fn create_trip(&self, trip: NewTrip) -> PortResult<Trip> {
        let sql = format!(
            "INSERT INTO trips (id, trip_name, total_budget, start_date, end_date, currency, \
             member_count, created_by) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TRIP_COLUMNS
        );
        let record = sqlx::query_as::<_, TripRecord>(&sql)
            .bind(new_document_id())
            .bind(&trip.trip_name)
            .bind(trip.total_budget)
            .bind(trip.start_date)
            .bind(trip.end_date)
            .bind(&trip.currency)
            .bind(trip.member_count)
            .bind(&trip.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.to_domain())
    }

    async fn patch_trip(&self, trip_id: &str, patch: TripPatch) -> PortResult<Trip> {
        let sql = format!(
            "UPDATE trips SET \
               trip_name = COALESCE($2, trip_name), \
               total_budget = COALESCE($3, total_budget), \
               start_date = COALESCE($4, start_date), \
               end_date = CASE WHEN $8 THEN NULL ELSE COALESCE($5, end_date) END, \
               currency = COALESCE($6, currency), \
               member_count = COALESCE($7, member_count), \
               updated_at = now() \
             WHERE id = $1 RETURNING {}",
            TRIP_COLUMNS
        );
        let clear_end_date = matches!(patch.end_date, Some(None));
        sqlx::query_as::<_, TripRecord>(&sql)
            .bind(trip_id)
            .bind(patch.trip_name)
            .bind(patch.total_budget)
            .bind(patch.start_date)
            .bind(patch.end_date.flatten())
            .bind(patch.currency)
            .bind(patch.member_count)
            .bind(clear_end_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .map(TripRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Trip {} not found", trip_id)))
    }

    async fn delete_trip(&self, trip_id: &str) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.publish(trip_id).await;
        self.live.forget(trip_id);
        Ok(result.rows_affected() > 0)
    }
}

//=========================================================================================
// `ItemStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ItemStore for DbAdapter {
    async fn create_item(&self, trip_id: &str, item: NewTripItem) -> PortResult<TripItem> {
        let sql = format!(
            "INSERT INTO trip_items (id, trip_id, name, amount, category, item_type, image_url, \
             thumbnail_url, blur_data_url, video_url, images, description, created_by, \"timestamp\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, COALESCE($14, now())) \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let record = sqlx::query_as::<_, ItemRecord>(&sql)
            .bind(new_document_id())
            .bind(trip_id)
            .bind(&item.name)
            .bind(item.amount)
            .bind(item.category.as_str())
            .bind(item.item_type.as_str())
            .bind(&item.image_url)
            .bind(&item.thumbnail_url)
            .bind(&item.blur_data_url)
            .bind(&item.video_url)
            .bind(&item.images)
            .bind(&item.description)
            .bind(&item.created_by)
            .bind(item.timestamp)
            .fetch_one(&self.pool)
            .await
            .map_err(item_write_error)?;
        self.publish(trip_id).await;
        Ok(record.to_domain())
    }

    async fn list_items(&self, trip_id: &str) -> PortResult<Vec<TripItem>> {
        let sql = format!(
            "SELECT {} FROM trip_items WHERE trip_id = $1 \
             ORDER BY \"timestamp\" DESC, created_at DESC, id DESC",
            ITEM_COLUMNS
        );
        let records = sqlx::query_as::<_, ItemRecord>(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(records.into_iter().map(ItemRecord::to_domain).collect())
    }

    async fn get_item(&self, trip_id: &str, item_id: &str) -> PortResult<Option<TripItem>> {
        let sql = format!(
            "SELECT {} FROM trip_items WHERE trip_id = $1 AND id = $2",
            ITEM_COLUMNS
        );
        let record = sqlx::query_as::<_, ItemRecord>(&sql)
            .bind(trip_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.map(ItemRecord::to_domain))
    }

    async fn replace_item(
        &self,
        trip_id: &str,
        item_id: &str,
        item: NewTripItem,
    ) -> PortResult<TripItem> {
        let sql = format!(
            "UPDATE trip_items SET name = $3, amount = $4, category = $5, item_type = $6, \
             image_url = $7, thumbnail_url = $8, blur_data_url = $9, video_url = $10, \
             images = $11, description = $12, \"timestamp\" = COALESCE($13, \"timestamp\"), \
             updated_at = now() \
             WHERE trip_id = $1 AND id = $2 RETURNING {}",
            ITEM_COLUMNS
        );
        let record = sqlx::query_as::<_, ItemRecord>(&sql)
            .bind(trip_id)
            .bind(item_id)
            .bind(&item.name)
            .bind(item.amount)
            .bind(item.category.as_str())
            .bind(item.item_type.as_str())
            .bind(&item.image_url)
            .bind(&item.thumbnail_url)
            .bind(&item.blur_data_url)
            .bind(&item.video_url)
            .bind(&item.images)
            .bind(&item.description)
            .bind(item.timestamp)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or_else(|| PortError::NotFound(format!("Item {} not found", item_id)))?;
        self.publish(trip_id).await;
        Ok(record.to_domain())
    }

    async fn delete_item(&self, trip_id: &str, item_id: &str) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM trip_items WHERE trip_id = $1 AND id = $2")
            .bind(trip_id)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            self.publish(trip_id).await;
        }
        Ok(deleted)
    }

    async fn subscribe(&self, trip_id: &str) -> PortResult<Subscription<TripItem>> {
        self.live.subscribe(trip_id, || self.list_items(trip_id)).await
    }
}

//=========================================================================================
// `AssetLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssetLedger for DbAdapter {
    async fn record(&self, path: &str, reason: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO pending_asset_deletions (path, reason) VALUES ($1, $2) \
             ON CONFLICT (path) DO UPDATE SET reason = EXCLUDED.reason",
        )
        .bind(path)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn pending(&self, limit: usize) -> PortResult<Vec<PendingAsset>> {
        let records = sqlx::query_as::<_, PendingAssetRecord>(
            "SELECT path, reason, recorded_at FROM pending_asset_deletions \
             ORDER BY recorded_at ASC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(records.into_iter().map(PendingAssetRecord::to_domain).collect())
    }

    async fn clear(&self, path: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM pending_asset_deletions WHERE path = $1")
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct CodedError(&'static str);

    impl fmt::Display for CodedError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "database error {}", self.0)
        }
    }

    impl std::error::Error for CodedError {}

    impl DatabaseError for CodedError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::ForeignKeyViolation
        }
    }

    fn foreign_key_violation() -> sqlx::Error {
        sqlx::Error::Database(Box::new(CodedError(FOREIGN_KEY_VIOLATION)))
    }

    #[test]
    fn item_insert_under_missing_trip_is_not_found() {
        assert!(matches!(
            item_write_error(foreign_key_violation()),
            PortError::NotFound(_)
        ));
    }

    #[test]
    fn other_foreign_key_violations_are_not_reported_as_missing() {
        let mapped = store_error(foreign_key_violation());
        assert!(matches!(mapped, PortError::Unexpected(_)));
    }

    #[test]
    fn lost_connections_are_retryable() {
        assert!(matches!(
            item_write_error(sqlx::Error::PoolTimedOut),
            PortError::StoreUnavailable(_)
        ));
    }
}
