//! Quarantine zone for soft-deleted files
//!
//! Deleting a file leaves its bytes in the basket and records what it was
//! here, so an outside recovery or reclaim sweep can act on it later. The
//! zone is bounded; once full, new items are dropped with a warning and the
//! delete still succeeds.

use crate::hash::ContentHash;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why an item ended up in quarantine
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarbageCategory {
    /// A file deleted from its basket, data still in place
    OrphanedBasketFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbageItem {
    pub tag: Tag,
    pub category: GarbageCategory,
    pub shelf_id: u16,
    pub size: u64,
    pub deletion_time: u64,
    pub quarantine_time: u64,
    pub is_recoverable: bool,
    /// Content hash of the file when it was deleted
    pub data_hash: ContentHash,
    pub description: String,
}

impl GarbageItem {
    /// Item for a file soft-deleted from a basket
    pub fn orphaned_file(
        tag: Tag,
        shelf_id: u16,
        size: u64,
        data_hash: ContentHash,
        filename: &str,
        now: u64,
    ) -> Self {
        GarbageItem {
            tag,
            category: GarbageCategory::OrphanedBasketFile,
            shelf_id,
            size,
            deletion_time: now,
            quarantine_time: now,
            is_recoverable: true,
            data_hash,
            description: format!("deleted basket file '{}'", filename),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineZone {
    items: Vec<GarbageItem>,
    max_items: usize,
    total_size: u64,
}

impl QuarantineZone {
    pub fn new(max_items: usize) -> Self {
        QuarantineZone {
            items: Vec::new(),
            max_items,
            total_size: 0,
        }
    }

    /// Record an item if there is room; returns whether it was kept
    pub fn quarantine(&mut self, item: GarbageItem) -> bool {
        if self.is_full() {
            warn!(
                "Quarantine full ({} items), dropping record for {}",
                self.max_items, item.tag
            );
            return false;
        }

        self.total_size += item.size;
        self.items.push(item);
        true
    }

    pub fn items(&self) -> &[GarbageItem] {
        &self.items
    }

    pub fn find(&self, tag: &Tag) -> Option<&GarbageItem> {
        self.items.iter().find(|item| item.tag == *tag)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the sizes of all quarantined items
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn capacity(&self) -> usize {
        self.max_items
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(seed: u8, size: u64) -> GarbageItem {
        GarbageItem::orphaned_file(
            Tag::from_bytes([seed; 16]),
            0,
            size,
            ContentHash::ZERO,
            "a.txt",
            1_000,
        )
    }

    #[test]
    fn test_quarantine_records_item() {
        let mut zone = QuarantineZone::new(4);
        assert!(zone.quarantine(item(1, 100)));

        let found = zone.find(&Tag::from_bytes([1; 16])).unwrap();
        assert!(found.is_recoverable);
        assert_eq!(found.category, GarbageCategory::OrphanedBasketFile);
        assert_eq!(found.deletion_time, 1_000);
        assert_eq!(zone.total_size(), 100);
        assert!(zone.find(&Tag::from_bytes([2; 16])).is_none());
    }

    #[test]
    fn test_full_zone_drops_silently() {
        let mut zone = QuarantineZone::new(2);
        assert!(zone.quarantine(item(1, 10)));
        assert!(zone.quarantine(item(2, 20)));
        assert!(zone.is_full());

        assert!(!zone.quarantine(item(3, 30)));
        assert_eq!(zone.len(), 2);
        assert_eq!(zone.total_size(), 30);
    }

    #[test]
    fn test_zero_capacity() {
        let mut zone = QuarantineZone::new(0);
        assert!(zone.is_full());
        assert!(!zone.quarantine(item(1, 10)));
        assert!(zone.is_empty());
    }
}
