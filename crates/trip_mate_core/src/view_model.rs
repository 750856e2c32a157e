//! crates/trip_mate_core/src/view_model.rs
//!
//! Derived, read-only views over the latest item snapshot plus the ephemeral
//! interaction state of a gallery: filters, the pending delete confirmation,
//! and the open detail view. The store stays the only source of truth; this
//! type never adds or removes items on its own.

use crate::deletion::DeletionCoordinator;
use crate::domain::{newest_first, Category, DeleteOutcome, ItemType, TripItem};
use crate::live::Snapshot;
use crate::ports::PortResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryFilter {
    #[default]
    All,
    Expense,
    Memory,
}

impl PrimaryFilter {
    fn admits(&self, item: &TripItem) -> bool {
        match self {
            PrimaryFilter::All => true,
            PrimaryFilter::Expense => item.item_type == ItemType::Expense,
            PrimaryFilter::Memory => item.item_type == ItemType::Memory,
        }
    }
}

/// Spend figures over expense items only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GalleryStats {
    pub total: f64,
    pub by_category: HashMap<Category, f64>,
    pub per_person: f64,
}

/// Computes totals for `items`. Non-expense items are ignored and a member
/// count below 1 is treated as 1.
pub fn compute_stats(items: &[TripItem], member_count: i64) -> GalleryStats {
    let mut stats = GalleryStats::default();
    for item in items.iter().filter(|i| i.is_expense()) {
        stats.total += item.amount;
        *stats.by_category.entry(item.category).or_insert(0.0) += item.amount;
    }
    stats.per_person = stats.total / member_count.max(1) as f64;
    stats
}

/// Position inside the open detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailCursor {
    pub item_id: String,
    pub asset_index: usize,
}

#[derive(Default)]
pub struct GalleryViewModel {
    items: Snapshot<TripItem>,
    filter: PrimaryFilter,
    category: Option<Category>,
    pending_delete: Option<String>,
    detail: Option<DetailCursor>,
}

impl GalleryViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held snapshot. Closes the detail view if its item vanished.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot<TripItem>) {
        self.items = snapshot;
        let Some(open_id) = self.detail.as_ref().map(|c| c.item_id.clone()) else {
            return;
        };
        match self.items.iter().find(|i| i.id == open_id) {
            Some(item) => {
                let last = item.media_urls().len().saturating_sub(1);
                if let Some(cursor) = &mut self.detail {
                    cursor.asset_index = cursor.asset_index.min(last);
                }
            }
            None => self.detail = None,
        }
    }

    pub fn items(&self) -> &[TripItem] {
        &self.items
    }

    pub fn filter(&self) -> PrimaryFilter {
        self.filter
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Choosing a primary filter drops any category filter.
    pub fn set_filter(&mut self, filter: PrimaryFilter) {
        self.filter = filter;
        self.category = None;
    }

    /// Choosing a category resets the primary filter to `All`; choosing the
    /// active category again turns it off.
    pub fn toggle_category(&mut self, category: Category) {
        self.filter = PrimaryFilter::All;
        self.category = if self.category == Some(category) {
            None
        } else {
            Some(category)
        };
    }

    /// The filtered items, newest event first.
    pub fn visible(&self) -> Vec<&TripItem> {
        let mut visible: Vec<&TripItem> = self
            .items
            .iter()
            .filter(|i| self.filter.admits(i))
            .filter(|i| self.category.map_or(true, |c| i.category == c))
            .collect();
        visible.sort_by(|a, b| newest_first(a, b));
        visible
    }

    pub fn stats(&self, member_count: i64) -> GalleryStats {
        compute_stats(&self.items, member_count)
    }

    //=====================================================================================
    // Delete Flow
    //=====================================================================================

    pub fn request_delete(&mut self, item_id: &str) {
        self.pending_delete = Some(item_id.to_string());
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    /// Deletes the item awaiting confirmation. Returns `Ok(None)` when nothing
    /// was pending. On failure all local state is left untouched; on success the
    /// item stays listed until the next snapshot drops it.
    pub async fn confirm_delete(
        &mut self,
        deleter: &DeletionCoordinator,
        trip_id: &str,
    ) -> PortResult<Option<DeleteOutcome>> {
        let Some(item_id) = self.pending_delete.clone() else {
            return Ok(None);
        };
        let outcome = match deleter.delete_item(trip_id, &item_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(trip_id, item_id = %item_id, error = %e, "delete failed");
                return Err(e);
            }
        };
        self.pending_delete = None;
        if self.detail.as_ref().is_some_and(|c| c.item_id == item_id) {
            self.detail = None;
        }
        info!(trip_id, item_id = %item_id, already_deleted = outcome.already_deleted, "delete confirmed");
        Ok(Some(outcome))
    }

    //=====================================================================================
    // Detail Navigation
    //=====================================================================================

    /// Opens the detail view on the first asset of a visible item.
    pub fn open_detail(&mut self, item_id: &str) -> bool {
        if !self.visible().iter().any(|i| i.id == item_id) {
            return false;
        }
        self.detail = Some(DetailCursor {
            item_id: item_id.to_string(),
            asset_index: 0,
        });
        true
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn detail(&self) -> Option<&DetailCursor> {
        self.detail.as_ref()
    }

    /// The open item and the URL of its current asset, if it has media.
    pub fn current_asset(&self) -> Option<(&TripItem, Option<&str>)> {
        let cursor = self.detail.as_ref()?;
        let item = self.items.iter().find(|i| i.id == cursor.item_id)?;
        let url = item.media_urls().get(cursor.asset_index).copied();
        Some((item, url))
    }

    fn detail_position(&self) -> Option<(Vec<&TripItem>, usize, usize)> {
        let cursor = self.detail.as_ref()?;
        let visible = self.visible();
        let position = visible.iter().position(|i| i.id == cursor.item_id)?;
        Some((visible, position, cursor.asset_index))
    }

    /// Advances through sibling assets first, then to the next item. Never wraps.
    pub fn next(&mut self) -> bool {
        let Some((visible, position, index)) = self.detail_position() else {
            return false;
        };
        let target = if index + 1 < visible[position].media_urls().len() {
            DetailCursor {
                item_id: visible[position].id.clone(),
                asset_index: index + 1,
            }
        } else if let Some(next) = visible.get(position + 1) {
            DetailCursor {
                item_id: next.id.clone(),
                asset_index: 0,
            }
        } else {
            return false;
        };
        self.detail = Some(target);
        true
    }

    /// Steps back through sibling assets, then to the first asset of the
    /// previous item. Never wraps.
    pub fn previous(&mut self) -> bool {
        let Some((visible, position, index)) = self.detail_position() else {
            return false;
        };
        let target = if index > 0 {
            DetailCursor {
                item_id: visible[position].id.clone(),
                asset_index: index - 1,
            }
        } else if position > 0 {
            DetailCursor {
                item_id: visible[position - 1].id.clone(),
                asset_index: 0,
            }
        } else {
            return false;
        };
        self.detail = Some(target);
        true
    }
}

impl From<Snapshot<TripItem>> for GalleryViewModel {
    fn from(snapshot: Snapshot<TripItem>) -> Self {
        let mut vm = Self::new();
        vm.apply_snapshot(snapshot);
        vm
    }
}

/// Convenience for callers holding a plain vector.
pub fn snapshot_of(items: Vec<TripItem>) -> Snapshot<TripItem> {
    Arc::new(items)
}
