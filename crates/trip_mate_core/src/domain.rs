//! crates/trip_mate_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format; the web
//! layer owns its own JSON representations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Name of the trip that is looked up (and created if absent) per owner.
pub const DEFAULT_TRIP_NAME: &str = "My Trip";

//=========================================================================================
// Closed Enumerations
//=========================================================================================

/// The category axis of a trip item. Independent of [`ItemType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Stay,
    Other,
    Scenery,
    Memory,
    Video,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Stay,
        Category::Other,
        Category::Scenery,
        Category::Memory,
        Category::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Stay => "stay",
            Category::Other => "other",
            Category::Scenery => "scenery",
            Category::Memory => "memory",
            Category::Video => "video",
        }
    }

    /// Parses untrusted input, mapping anything unknown to `Other`.
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or(Category::Other)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an item is money spent or a keepsake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Expense,
    Memory,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Expense => "expense",
            ItemType::Memory => "memory",
        }
    }

    /// Parses untrusted input, mapping anything unknown to `Memory` so a bad
    /// value can never inflate spend totals.
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or(ItemType::Memory)
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(ItemType::Expense),
            "memory" => Ok(ItemType::Memory),
            _ => Err(format!("unknown item type '{}'", s)),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Trip
//=========================================================================================

/// A shared travel budget context.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub trip_name: String,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub currency: String,
    pub member_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// The split divisor. Falls back to 1 for zero or negative counts that
    /// slipped past creation-time validation via a patch.
    pub fn effective_member_count(&self) -> i64 {
        if self.member_count < 1 {
            1
        } else {
            self.member_count
        }
    }
}

/// Input for creating a trip. Identifier and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub trip_name: String,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub currency: String,
    pub member_count: i64,
    pub created_by: String,
}

impl NewTrip {
    /// The trip created on first use for an owner.
    pub fn default_for(owner: &str, now: DateTime<Utc>) -> Self {
        Self {
            trip_name: DEFAULT_TRIP_NAME.to_string(),
            total_budget: 10_000.0,
            start_date: now,
            end_date: None,
            currency: "VND".to_string(),
            member_count: 1,
            created_by: owner.to_string(),
        }
    }
}

/// A partial update. The owner is deliberately absent: it never changes.
#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    pub trip_name: Option<String>,
    pub total_budget: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the end date; `None` leaves it alone.
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub currency: Option<String>,
    pub member_count: Option<i64>,
}

impl TripPatch {
    pub fn is_empty(&self) -> bool {
        self.trip_name.is_none()
            && self.total_budget.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.currency.is_none()
            && self.member_count.is_none()
    }

    pub fn apply_to(&self, trip: &mut Trip) {
        if let Some(name) = &self.trip_name {
            trip.trip_name = name.clone();
        }
        if let Some(budget) = self.total_budget {
            trip.total_budget = budget;
        }
        if let Some(start) = self.start_date {
            trip.start_date = start;
        }
        if let Some(end) = self.end_date {
            trip.end_date = end;
        }
        if let Some(currency) = &self.currency {
            trip.currency = currency.clone();
        }
        if let Some(count) = self.member_count {
            trip.member_count = count;
        }
    }
}

//=========================================================================================
// TripItem
//=========================================================================================

/// One expense record or one memory, scoped to exactly one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripItem {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    pub amount: f64,
    pub category: Category,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub blur_data_url: Option<String>,
    pub video_url: Option<String>,
    pub images: Vec<String>,
    pub description: String,
    pub created_by: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripItem {
    pub fn is_expense(&self) -> bool {
        self.item_type == ItemType::Expense
    }

    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.video_url.is_some()
    }

    /// Every navigable asset of this item: the video alone, or the primary
    /// image followed by any sibling images.
    pub fn media_urls(&self) -> Vec<&str> {
        if let Some(video) = &self.video_url {
            return vec![video.as_str()];
        }
        self.image_url
            .iter()
            .map(String::as_str)
            .chain(self.images.iter().map(String::as_str))
            .collect()
    }

    /// Every stored blob this item references, deduplicated. The blur
    /// placeholder is inline data and never a blob.
    pub fn asset_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = Vec::new();
        let candidates = self
            .image_url
            .iter()
            .chain(self.thumbnail_url.iter())
            .chain(self.video_url.iter())
            .chain(self.images.iter());
        for url in candidates {
            if !urls.contains(&url.as_str()) {
                urls.push(url.as_str());
            }
        }
        urls
    }
}

/// Input for creating or overwriting an item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTripItem {
    pub name: String,
    pub amount: f64,
    pub category: Category,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub blur_data_url: Option<String>,
    pub video_url: Option<String>,
    pub images: Vec<String>,
    pub description: String,
    pub created_by: String,
    /// When the expense/memory happened. `None` means "now" at write time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewTripItem {
    pub fn new(name: &str, category: Category, item_type: ItemType, created_by: &str) -> Self {
        Self {
            name: name.to_string(),
            amount: 0.0,
            category,
            item_type,
            image_url: None,
            thumbnail_url: None,
            blur_data_url: None,
            video_url: None,
            images: Vec::new(),
            description: String::new(),
            created_by: created_by.to_string(),
            timestamp: None,
        }
    }

    /// Zeroes the amount of anything that is not an expense.
    pub fn normalized(mut self) -> Self {
        if self.item_type != ItemType::Expense {
            self.amount = 0.0;
        }
        self
    }
}

/// Orders items by event timestamp, most recent first. Ties fall back to
/// creation time and then identifier so every reader sees the same order.
pub fn newest_first(a: &TripItem, b: &TripItem) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_newest_first(items: &mut [TripItem]) {
    items.sort_by(newest_first);
}

/// A store-assigned document identifier.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

//=========================================================================================
// Transient Values
//=========================================================================================

/// The validated output of the image classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub item_type: ItemType,
    pub category: Category,
    pub name: String,
    pub amount: f64,
    pub description: String,
}

/// The kind of media a selected file carries, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let lowered = content_type.to_ascii_lowercase();
        if lowered.starts_with("image/") {
            Some(MediaKind::Image)
        } else if lowered.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Where the bytes of one uploaded file ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAsset {
    pub url: String,
    pub path: String,
    pub thumbnail_url: String,
    pub thumbnail_path: Option<String>,
    pub blur_data_url: Option<String>,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub kind: MediaKind,
}

impl UploadedAsset {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Every stored path belonging to this upload.
    pub fn stored_paths(&self) -> Vec<String> {
        let mut paths = vec![self.path.clone()];
        if let Some(thumb) = &self.thumbnail_path {
            paths.push(thumb.clone());
        }
        paths
    }
}

/// Result of an idempotent item delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub already_deleted: bool,
    /// Blob paths that could not be removed and were parked in the ledger.
    pub orphaned_assets: Vec<String>,
}

impl DeleteOutcome {
    pub fn already_gone() -> Self {
        Self {
            already_deleted: true,
            orphaned_assets: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.orphaned_assets.is_empty()
    }
}
