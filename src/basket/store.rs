//! Basket Store: header persistence, slot search and basket data I/O
//!
//! Headers are cached in a write-through LRU keyed by basket tag, so a
//! header is only decoded from the physical store once while it stays hot.

use crate::basket::header::BasketHeader;
use crate::basket::{BASKET_MAX_FILES, HEADER_SIZE};
use crate::error::{BasketError, Result};
use crate::hash::{ContentHash, ContentHasher};
use crate::index::{ContainerKind, PositionIndex};
use crate::io::PhysicalStore;
use crate::shelf::Shelf;
use crate::tag::Tag;
use lru::LruCache;
use std::num::NonZeroUsize;

pub struct BasketStore {
    store: Box<dyn PhysicalStore>,
    hasher: Box<dyn ContentHasher>,
    cache: LruCache<Tag, BasketHeader>,
}

impl BasketStore {
    pub fn new(
        store: Box<dyn PhysicalStore>,
        hasher: Box<dyn ContentHasher>,
        cache_capacity: usize,
    ) -> Self {
        BasketStore {
            store,
            hasher,
            cache: LruCache::new(NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn hasher(&self) -> &dyn ContentHasher {
        self.hasher.as_ref()
    }

    pub fn digest(&self, bytes: &[u8]) -> ContentHash {
        self.hasher.digest(bytes)
    }

    /// Bump-allocate `size` bytes at the end of the shelf's used region
    ///
    /// Space released by baskets is never reused. Shelf-level capacity must be
    /// checked by the caller first; this only guards against overrun.
    pub fn allocate_space(&self, shelf: &Shelf, size: u64) -> Result<u64> {
        if shelf.used_size + size > shelf.total_size {
            return Err(BasketError::DiskFull {
                shelf_id: shelf.id,
                needed: size,
                available: shelf.free_size,
            });
        }
        Ok(shelf.physical_start + shelf.used_size)
    }

    /// Seal the header hash and persist the full header at its physical offset
    pub fn write_header(&mut self, header: &mut BasketHeader) -> Result<()> {
        header.seal(self.hasher.as_ref());
        self.store
            .write(header.shelf_id, header.physical_offset, &header.to_bytes())?;
        self.cache.put(header.tag, header.clone());
        Ok(())
    }

    /// Resolve `tag` to a basket through the index and load its header
    pub fn read_header(&mut self, index: &PositionIndex, tag: &Tag) -> Result<BasketHeader> {
        let entry = index
            .lookup(tag)
            .filter(|entry| entry.kind == ContainerKind::Basket)
            .ok_or(BasketError::BasketNotFound(*tag))?;

        if let Some(header) = self.cache.get(tag) {
            return Ok(header.clone());
        }

        let bytes = self
            .store
            .read(entry.shelf_id, entry.physical_offset, HEADER_SIZE)?;
        let header = BasketHeader::from_bytes(&bytes)?;

        if header.tag != *tag || header.physical_offset != entry.physical_offset {
            return Err(BasketError::CorruptedData(format!(
                "header at shelf {} offset {} does not belong to basket {}",
                entry.shelf_id, entry.physical_offset, tag
            )));
        }
        if !header.verify(self.hasher.as_ref()) {
            return Err(BasketError::HeaderHashMismatch(*tag));
        }

        self.cache.put(*tag, header.clone());
        Ok(header)
    }

    /// First slot with the deleted flag set
    pub fn find_free_slot(header: &BasketHeader) -> Result<usize> {
        header
            .slots()
            .iter()
            .take(BASKET_MAX_FILES)
            .position(|slot| slot.is_deleted)
            .ok_or(BasketError::BasketFull(header.tag))
    }

    /// Write file bytes at `data_offset` inside the basket
    pub fn write_data(&mut self, header: &BasketHeader, data_offset: u64, data: &[u8]) -> Result<()> {
        self.store
            .write(header.shelf_id, header.physical_offset + data_offset, data)
    }

    /// Read `len` file bytes at `data_offset` inside the basket
    pub fn read_data(&mut self, header: &BasketHeader, data_offset: u64, len: usize) -> Result<Vec<u8>> {
        self.store
            .read(header.shelf_id, header.physical_offset + data_offset, len)
    }

    /// Drop every cached header, forcing the next read to hit the store
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_headers(&self) -> usize {
        self.cache.len()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::BASKET_DEFAULT_SIZE;
    use crate::config::ShelfConfig;
    use crate::error::ErrorKind;
    use crate::hash::Sha256Hasher;
    use crate::io::MemoryStore;

    fn setup() -> (BasketStore, MemoryStore, PositionIndex) {
        let memory = MemoryStore::new();
        let store = BasketStore::new(Box::new(memory.clone()), Box::new(Sha256Hasher), 4);
        (store, memory, PositionIndex::new(16))
    }

    fn persist_basket(store: &mut BasketStore, index: &mut PositionIndex, seed: u8, offset: u64) -> Tag {
        let tag = Tag::from_bytes([seed; 16]);
        let mut header = BasketHeader::new(tag, 0, offset, 10);
        store.write_header(&mut header).unwrap();
        index.insert(tag, tag, 0, offset, 0, 10).unwrap();
        tag
    }

    #[test]
    fn test_allocate_space_is_bump() {
        let (store, _, _) = setup();
        let mut shelf = Shelf::new(&ShelfConfig {
            id: 0,
            physical_start: 4096,
            total_size: 3 * BASKET_DEFAULT_SIZE,
            max_baskets: 8,
        });

        assert_eq!(store.allocate_space(&shelf, BASKET_DEFAULT_SIZE).unwrap(), 4096);
        shelf.record_basket(BASKET_DEFAULT_SIZE);
        assert_eq!(
            store.allocate_space(&shelf, BASKET_DEFAULT_SIZE).unwrap(),
            4096 + BASKET_DEFAULT_SIZE
        );

        shelf.record_basket(BASKET_DEFAULT_SIZE);
        shelf.record_basket(BASKET_DEFAULT_SIZE);
        let err = store.allocate_space(&shelf, BASKET_DEFAULT_SIZE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiskFull);
    }

    #[test]
    fn test_write_then_read_header() {
        let (mut store, _, mut index) = setup();
        let tag = persist_basket(&mut store, &mut index, 1, 0);

        store.clear_cache();
        let header = store.read_header(&index, &tag).unwrap();
        assert_eq!(header.tag, tag);
        assert!(header.verify(store.hasher()));
        assert_eq!(store.cached_headers(), 1);
    }

    #[test]
    fn test_read_unknown_basket() {
        let (mut store, _, index) = setup();
        let err = store.read_header(&index, &Tag::from_bytes([9; 16])).unwrap_err();
        assert!(matches!(err, BasketError::BasketNotFound(_)));
    }

    #[test]
    fn test_read_detects_tampered_header() {
        let (mut store, memory, mut index) = setup();
        let tag = persist_basket(&mut store, &mut index, 2, 0);

        // Flip a byte inside the used_space field
        memory.corrupt_byte(0, 40);
        store.clear_cache();

        let err = store.read_header(&index, &tag).unwrap_err();
        assert!(matches!(err, BasketError::HeaderHashMismatch(_)));
    }

    #[test]
    fn test_find_free_slot() {
        let mut header = BasketHeader::new(Tag::from_bytes([3; 16]), 0, 0, 0);
        assert_eq!(BasketStore::find_free_slot(&header).unwrap(), 0);

        header.slot_mut(0).unwrap().is_deleted = false;
        assert_eq!(BasketStore::find_free_slot(&header).unwrap(), 1);

        for i in 0..BASKET_MAX_FILES {
            header.slot_mut(i).unwrap().is_deleted = false;
        }
        let err = BasketStore::find_free_slot(&header).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BasketFull);
    }

    #[test]
    fn test_data_round_trip() {
        let (mut store, _, mut index) = setup();
        let tag = persist_basket(&mut store, &mut index, 4, BASKET_DEFAULT_SIZE);
        let header = store.read_header(&index, &tag).unwrap();

        store.write_data(&header, HEADER_SIZE as u64, b"small file").unwrap();
        assert_eq!(
            store.read_data(&header, HEADER_SIZE as u64, 10).unwrap(),
            b"small file"
        );
    }
}
