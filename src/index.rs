//! Position index ("Taver"): tag → physical location
//!
//! The single source of truth for where a basket or file lives. Entries are
//! kept in insertion order (removal shifts, it never swaps) so iteration is
//! reproducible; two hash maps make tag lookup and owning-basket resolution
//! constant time.
//!
//! A file's owning basket is found by matching shelf id and physical offset
//! against the basket entries, not through a stored back-reference.

use crate::basket::BASKET_DEFAULT_SIZE;
use crate::error::{BasketError, Result};
use crate::tag::Tag;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// What a position entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Basket,
    BasketFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub tag: Tag,
    pub shelf_id: u16,
    /// Physical offset of the basket (for files: of the owning basket)
    pub physical_offset: u64,
    pub kind: ContainerKind,
    /// Data offset inside the basket, zero for baskets
    pub internal_offset: u32,
    pub size: u64,
    pub last_access: u64,
    pub access_frequency: u32,
    pub is_fragmented: bool,
}

pub struct PositionIndex {
    entries: Vec<PositionEntry>,
    by_tag: AHashMap<Tag, usize>,
    baskets_by_location: AHashMap<(u16, u64), Tag>,
    max_entries: usize,
    last_update: u64,
}

impl PositionIndex {
    pub fn new(max_entries: usize) -> Self {
        PositionIndex {
            entries: Vec::new(),
            by_tag: AHashMap::new(),
            baskets_by_location: AHashMap::new(),
            max_entries,
            last_update: 0,
        }
    }

    /// Rebuild an index from saved entries, preserving their order
    pub fn from_entries(entries: Vec<PositionEntry>, max_entries: usize) -> Result<Self> {
        if entries.len() > max_entries {
            return Err(BasketError::OutOfMemory(max_entries));
        }

        let mut index = Self::new(max_entries);
        for entry in entries {
            if index.by_tag.contains_key(&entry.tag) {
                return Err(BasketError::CorruptedData(format!(
                    "duplicate index entry for {}",
                    entry.tag
                )));
            }
            index.last_update = index.last_update.max(entry.last_access);
            index.push(entry);
        }
        Ok(index)
    }

    fn push(&mut self, entry: PositionEntry) {
        if entry.kind == ContainerKind::Basket {
            self.baskets_by_location
                .insert((entry.shelf_id, entry.physical_offset), entry.tag);
        }
        self.by_tag.insert(entry.tag, self.entries.len());
        self.entries.push(entry);
    }

    /// Record a basket (when `file_tag == basket_tag`) or a file inside it
    pub fn insert(
        &mut self,
        file_tag: Tag,
        basket_tag: Tag,
        shelf_id: u16,
        physical_offset: u64,
        internal_offset: u32,
        now: u64,
    ) -> Result<()> {
        if !self.has_capacity(1) {
            return Err(BasketError::OutOfMemory(self.max_entries));
        }
        if self.by_tag.contains_key(&file_tag) {
            return Err(BasketError::InvalidParameter(format!(
                "tag {} is already indexed",
                file_tag
            )));
        }

        let entry = if file_tag == basket_tag {
            PositionEntry {
                tag: file_tag,
                shelf_id,
                physical_offset,
                kind: ContainerKind::Basket,
                internal_offset: 0,
                size: BASKET_DEFAULT_SIZE,
                last_access: now,
                access_frequency: 0,
                is_fragmented: false,
            }
        } else {
            PositionEntry {
                tag: file_tag,
                shelf_id,
                physical_offset,
                kind: ContainerKind::BasketFile,
                internal_offset,
                // Filled in once the data is known to be written
                size: 0,
                last_access: now,
                access_frequency: 0,
                is_fragmented: false,
            }
        };

        self.push(entry);
        self.last_update = now;
        Ok(())
    }

    pub fn lookup(&self, tag: &Tag) -> Option<&PositionEntry> {
        self.by_tag.get(tag).map(|&pos| &self.entries[pos])
    }

    fn lookup_mut(&mut self, tag: &Tag) -> Option<&mut PositionEntry> {
        let pos = *self.by_tag.get(tag)?;
        self.entries.get_mut(pos)
    }

    /// Tag of the basket sharing the file entry's shelf id and physical offset
    ///
    /// A file with no such basket is an integrity violation.
    pub fn find_owning_basket(&self, file_entry: &PositionEntry) -> Result<Tag> {
        self.baskets_by_location
            .get(&(file_entry.shelf_id, file_entry.physical_offset))
            .copied()
            .ok_or_else(|| {
                BasketError::CorruptedData(format!(
                    "file {} has no basket at shelf {} offset {}",
                    file_entry.tag, file_entry.shelf_id, file_entry.physical_offset
                ))
            })
    }

    /// Remove an entry, shifting later entries down to keep their order
    pub fn remove(&mut self, tag: &Tag) -> Option<PositionEntry> {
        let pos = self.by_tag.remove(tag)?;
        let entry = self.entries.remove(pos);

        for slot in self.by_tag.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        if entry.kind == ContainerKind::Basket {
            self.baskets_by_location
                .remove(&(entry.shelf_id, entry.physical_offset));
        }

        Some(entry)
    }

    /// Bump access bookkeeping after a successful read
    pub fn record_access(&mut self, tag: &Tag, now: u64) {
        if let Some(entry) = self.lookup_mut(tag) {
            entry.access_frequency = entry.access_frequency.saturating_add(1);
            entry.last_access = now;
        }
    }

    pub fn set_internal_offset(&mut self, tag: &Tag, internal_offset: u32) {
        if let Some(entry) = self.lookup_mut(tag) {
            entry.internal_offset = internal_offset;
        }
    }

    pub fn set_size(&mut self, tag: &Tag, size: u64) {
        if let Some(entry) = self.lookup_mut(tag) {
            entry.size = size;
        }
    }

    pub fn set_fragmented(&mut self, tag: &Tag, is_fragmented: bool) {
        if let Some(entry) = self.lookup_mut(tag) {
            entry.is_fragmented = is_fragmented;
        }
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[PositionEntry] {
        &self.entries
    }

    /// Files whose entries point at the given basket location
    pub fn files_in(&self, shelf_id: u16, physical_offset: u64) -> impl Iterator<Item = &PositionEntry> {
        self.entries.iter().filter(move |entry| {
            entry.kind == ContainerKind::BasketFile
                && entry.shelf_id == shelf_id
                && entry.physical_offset == physical_offset
        })
    }

    pub fn has_capacity(&self, additional: usize) -> bool {
        self.entries.len() + additional <= self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Time of the last insert
    pub fn last_update(&self) -> u64 {
        self.last_update
    }
}
