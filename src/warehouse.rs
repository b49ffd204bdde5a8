//! Warehouse: the basket operations and the state they share
//!
//! A [`Warehouse`] owns the shelves, the position index, the quarantine zone
//! and the basket store, plus the external collaborators (physical store,
//! journal, clock, tag generator, hasher). It is created unmounted; every
//! basket operation requires [`Warehouse::mount`] first.
//!
//! Operations are not internally synchronized. Share a warehouse between
//! threads as `Arc<parking_lot::Mutex<Warehouse>>`, which serializes the
//! read-modify-write cycle of each operation.

use crate::basket::header::{BasketHeader, BasketStats, DataType, FileSlot, SlotState};
use crate::basket::store::BasketStore;
use crate::basket::{
    BASKET_DEFAULT_SIZE, BASKET_MAX_FILES, BASKET_MAX_FILE_SIZE, DEFAULT_PERMISSIONS,
    MAX_FILENAME_LENGTH,
};
use crate::clock::{Clock, SystemClock};
use crate::compactor::{self, CompactionReport};
use crate::config::WarehouseConfig;
use crate::error::{BasketError, Result};
use crate::hash::{ContentHash, ContentHasher, Sha256Hasher};
use crate::index::{ContainerKind, PositionEntry, PositionIndex};
use crate::io::{MemoryStore, PhysicalStore};
use crate::journal::{Journal, JournalEntry, JournalOperation, MemoryJournal, Subsystem};
use crate::quarantine::{GarbageItem, QuarantineZone};
use crate::shelf::Shelf;
use crate::tag::{RandomTagGenerator, Tag, TagGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use validator::Validate;

/// Whether basket operations are currently allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountState {
    Unmounted,
    Mounted,
}

/// Public view of a live file slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub tag: Tag,
    pub filename: String,
    pub size: u32,
    pub data_type: DataType,
    pub permissions: u16,
    pub creation_time: u64,
    pub modification_time: u64,
    pub access_time: u64,
    pub content_hash: ContentHash,
}

impl From<&FileSlot> for FileInfo {
    fn from(slot: &FileSlot) -> Self {
        FileInfo {
            tag: slot.tag,
            filename: slot.filename.clone(),
            size: slot.size,
            data_type: slot.data_type,
            permissions: slot.permissions,
            creation_time: slot.creation_time,
            modification_time: slot.modification_time,
            access_time: slot.access_time,
            content_hash: slot.content_hash,
        }
    }
}

/// Warehouse-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStats {
    pub state: MountState,
    pub shelf_count: usize,
    pub basket_count: usize,
    pub file_count: usize,
    pub index_entries: usize,
    pub index_capacity: usize,
    pub quarantined_items: usize,
    pub quarantined_bytes: u64,
    pub total_reads: u64,
    pub total_writes: u64,
    pub journal_sequence: u64,
}

/// One problem found by [`Warehouse::check_integrity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Basket or file the problem was found on
    pub tag: Tag,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub baskets_checked: usize,
    pub files_checked: usize,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn flag(&mut self, tag: Tag, message: impl Into<String>) {
        self.violations.push(IntegrityViolation {
            tag,
            message: message.into(),
        });
    }
}

/// Everything that outlives an unmount
#[derive(Serialize, Deserialize)]
struct SavedState {
    shelves: Vec<Shelf>,
    index: Vec<PositionEntry>,
    quarantine: QuarantineZone,
    journal_sequence: u64,
    total_reads: u64,
    total_writes: u64,
}

/// Wires a [`Warehouse`] to its collaborators
///
/// Anything not supplied falls back to the in-memory or system default.
pub struct WarehouseBuilder {
    config: WarehouseConfig,
    store: Option<Box<dyn PhysicalStore>>,
    journal: Option<Box<dyn Journal>>,
    clock: Option<Box<dyn Clock>>,
    tags: Option<Box<dyn TagGenerator>>,
    hasher: Option<Box<dyn ContentHasher>>,
}

impl WarehouseBuilder {
    pub fn new(config: WarehouseConfig) -> Self {
        WarehouseBuilder {
            config,
            store: None,
            journal: None,
            clock: None,
            tags: None,
            hasher: None,
        }
    }

    pub fn store(mut self, store: impl PhysicalStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn journal(mut self, journal: impl Journal + 'static) -> Self {
        self.journal = Some(Box::new(journal));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn tag_generator(mut self, tags: impl TagGenerator + 'static) -> Self {
        self.tags = Some(Box::new(tags));
        self
    }

    pub fn hasher(mut self, hasher: impl ContentHasher + 'static) -> Self {
        self.hasher = Some(Box::new(hasher));
        self
    }

    /// Validate the configuration and build an unmounted warehouse
    pub fn build(self) -> Result<Warehouse> {
        self.config.validate()?;

        let baskets = BasketStore::new(
            self.store.unwrap_or_else(|| Box::new(MemoryStore::new())),
            self.hasher.unwrap_or_else(|| Box::new(Sha256Hasher)),
            self.config.cache.header_capacity,
        );

        let shelves = self
            .config
            .shelves
            .iter()
            .map(|shelf| (shelf.id, Shelf::new(shelf)))
            .collect();

        Ok(Warehouse {
            state: MountState::Unmounted,
            shelves,
            index: PositionIndex::new(self.config.index.max_entries),
            quarantine: QuarantineZone::new(self.config.quarantine.max_items),
            baskets,
            journal: self.journal.unwrap_or_else(|| Box::new(MemoryJournal::new())),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            tags: self
                .tags
                .unwrap_or_else(|| Box::new(RandomTagGenerator::new())),
            journal_sequence: 0,
            total_reads: 0,
            total_writes: 0,
            config: self.config,
        })
    }
}

/// Small-file warehouse
///
/// Packs files into fixed-size baskets carved from shelves. Baskets and
/// files are addressed only by their [`Tag`].
pub struct Warehouse {
    config: WarehouseConfig,

    state: MountState,

    /// Shelves by id
    shelves: BTreeMap<u16, Shelf>,

    /// Tag → location, for baskets and files
    index: PositionIndex,

    /// Metadata of soft-deleted files
    quarantine: QuarantineZone,

    /// Header persistence and basket data I/O
    baskets: BasketStore,

    journal: Box<dyn Journal>,
    clock: Box<dyn Clock>,
    tags: Box<dyn TagGenerator>,

    /// Last journal sequence number handed out
    journal_sequence: u64,

    total_reads: u64,
    total_writes: u64,
}

impl Warehouse {
    /// Build an unmounted warehouse with default collaborators
    pub fn new(config: WarehouseConfig) -> Result<Self> {
        WarehouseBuilder::new(config).build()
    }

    pub fn builder(config: WarehouseConfig) -> WarehouseBuilder {
        WarehouseBuilder::new(config)
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.state == MountState::Mounted
    }

    fn ensure_mounted(&self) -> Result<()> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(BasketError::SystemNotMounted)
        }
    }

    /// Mount the warehouse, loading saved state if a state file exists
    pub fn mount(&mut self) -> Result<()> {
        if self.is_mounted() {
            debug!("Warehouse already mounted");
            return Ok(());
        }

        if let Some(path) = self.config.state_path.clone() {
            if path.exists() {
                self.load_state(&path)?;
                info!(
                    "Loaded warehouse state from {} ({} index entries)",
                    path.display(),
                    self.index.len()
                );
            }
        }

        // Headers are re-read from the store after a remount
        self.baskets.clear_cache();
        self.state = MountState::Mounted;
        info!("Warehouse mounted with {} shelves", self.shelves.len());
        Ok(())
    }

    /// Flush the physical store, save state and unmount
    pub fn unmount(&mut self) -> Result<()> {
        self.ensure_mounted()?;

        self.baskets.flush()?;
        if let Some(path) = self.config.state_path.clone() {
            self.save_state(&path)?;
            info!("Saved warehouse state to {}", path.display());
        }

        self.state = MountState::Unmounted;
        info!("Warehouse unmounted");
        Ok(())
    }

    fn save_state(&self, path: &Path) -> Result<()> {
        let state = SavedState {
            shelves: self.shelves.values().cloned().collect(),
            index: self.index.entries().to_vec(),
            quarantine: self.quarantine.clone(),
            journal_sequence: self.journal_sequence,
            total_reads: self.total_reads,
            total_writes: self.total_writes,
        };

        let data = serde_json::to_vec_pretty(&state)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read(path)?;
        let state: SavedState = serde_json::from_slice(&data)?;

        let mut shelves = BTreeMap::new();
        for saved in state.shelves {
            let configured = self.shelves.get(&saved.id).ok_or_else(|| {
                BasketError::CorruptedData(format!(
                    "saved state has shelf {} which is not configured",
                    saved.id
                ))
            })?;
            let shelf = configured.restore_usage(&saved)?;
            shelves.insert(shelf.id, shelf);
        }
        // Shelves added to the configuration since the last save start empty
        for (id, shelf) in &self.shelves {
            shelves.entry(*id).or_insert_with(|| shelf.clone());
        }

        self.index = PositionIndex::from_entries(state.index, self.config.index.max_entries)?;
        self.shelves = shelves;
        self.quarantine = state.quarantine;
        self.journal_sequence = state.journal_sequence;
        self.total_reads = state.total_reads;
        self.total_writes = state.total_writes;
        Ok(())
    }

    /// Carve a new empty basket out of `shelf_id`
    pub fn create_basket(&mut self, shelf_id: u16) -> Result<Tag> {
        self.ensure_mounted()?;

        let shelf = self
            .shelves
            .get(&shelf_id)
            .ok_or_else(|| BasketError::InvalidParameter(format!("unknown shelf {}", shelf_id)))?;
        shelf.check_capacity(BASKET_DEFAULT_SIZE)?;
        if !self.index.has_capacity(1) {
            return Err(BasketError::OutOfMemory(self.index.capacity()));
        }

        let physical_offset = self.baskets.allocate_space(shelf, BASKET_DEFAULT_SIZE)?;
        let tag = self.tags.new_tag();
        let now = self.clock.now();

        let mut header = BasketHeader::new(tag, shelf_id, physical_offset, now);
        self.baskets.write_header(&mut header)?;
        self.index
            .insert(tag, tag, shelf_id, physical_offset, 0, now)?;
        if let Some(shelf) = self.shelves.get_mut(&shelf_id) {
            shelf.record_basket(BASKET_DEFAULT_SIZE);
        }

        self.total_writes += 1;
        self.record(
            JournalOperation::Write,
            tag,
            shelf_id,
            BASKET_DEFAULT_SIZE,
            format!("created basket at offset {}", physical_offset),
            now,
        );
        debug!(
            "Created basket {} on shelf {} at offset {}",
            tag, shelf_id, physical_offset
        );

        Ok(tag)
    }

    /// Pack `data` into the basket as `filename`
    ///
    /// If the basket is short on bytes it is compacted once before giving up
    /// with [`BasketError::BasketFull`].
    pub fn add_file(&mut self, basket_tag: &Tag, filename: &str, data: &[u8]) -> Result<Tag> {
        self.ensure_mounted()?;

        if data.is_empty() {
            return Err(BasketError::InvalidParameter("file data is empty".to_string()));
        }
        if data.len() > BASKET_MAX_FILE_SIZE as usize {
            return Err(BasketError::InvalidParameter(format!(
                "file is {} bytes, limit is {}",
                data.len(),
                BASKET_MAX_FILE_SIZE
            )));
        }
        validate_filename(filename)?;
        if !self.index.has_capacity(1) {
            return Err(BasketError::OutOfMemory(self.index.capacity()));
        }

        let mut header = self.baskets.read_header(&self.index, basket_tag)?;
        if header.file_count as usize >= BASKET_MAX_FILES {
            return Err(BasketError::BasketFull(*basket_tag));
        }

        let size = data.len() as u64;
        let now = self.clock.now();
        if !has_room(&header, size) {
            self.run_compaction(&mut header, now)?;
            if !has_room(&header, size) {
                return Err(BasketError::BasketFull(*basket_tag));
            }
        }

        let slot_index = BasketStore::find_free_slot(&header)?;
        let data_offset = header.data_end;
        self.baskets.write_data(&header, data_offset, data)?;

        let file_tag = self.tags.new_tag();
        let content_hash = self.baskets.digest(data);
        let slot = header
            .slot_mut(slot_index)
            .ok_or(BasketError::BasketFull(*basket_tag))?;
        let reused_deleted = slot.state() == SlotState::Deleted;
        *slot = FileSlot {
            tag: file_tag,
            filename: filename.to_string(),
            size: data.len() as u32,
            data_offset: data_offset as u32,
            creation_time: now,
            modification_time: now,
            access_time: now,
            content_hash,
            data_type: DataType::from_filename(filename),
            permissions: DEFAULT_PERMISSIONS,
            is_deleted: false,
        };

        if reused_deleted {
            header.deleted_count = header.deleted_count.saturating_sub(1);
        }
        header.file_count += 1;
        header.used_space += size;
        header.free_space -= size;
        header.data_end += size;
        self.baskets.write_header(&mut header)?;

        self.index.insert(
            file_tag,
            *basket_tag,
            header.shelf_id,
            header.physical_offset,
            data_offset as u32,
            now,
        )?;
        self.index.set_size(&file_tag, size);

        self.total_writes += 1;
        self.record(
            JournalOperation::Write,
            file_tag,
            header.shelf_id,
            size,
            format!("added '{}' to basket {}", filename, basket_tag),
            now,
        );
        debug!(
            "Added file {} ({} bytes) to basket {} slot {}",
            file_tag, size, basket_tag, slot_index
        );

        Ok(file_tag)
    }

    /// Copy a file's verified bytes into `buf`, returning the byte count
    ///
    /// A buffer shorter than the file fails with
    /// [`BasketError::BufferTooSmall`] before anything is read or touched.
    pub fn read_file(&mut self, file_tag: &Tag, buf: &mut [u8]) -> Result<usize> {
        self.ensure_mounted()?;

        let (header, slot_index) = self.locate_file(file_tag)?;
        self.read_into(file_tag, header, slot_index, buf)
    }

    /// Read a whole file into a new vector
    pub fn read_file_to_vec(&mut self, file_tag: &Tag) -> Result<Vec<u8>> {
        self.ensure_mounted()?;

        let (header, slot_index) = self.locate_file(file_tag)?;
        let mut buf = vec![0u8; header.slots()[slot_index].size as usize];
        let n = self.read_into(file_tag, header, slot_index, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Verified read of an already located slot, updating its access time
    fn read_into(
        &mut self,
        file_tag: &Tag,
        mut header: BasketHeader,
        slot_index: usize,
        buf: &mut [u8],
    ) -> Result<usize> {
        let slot = &header.slots()[slot_index];
        let size = slot.size as usize;
        if buf.len() < size {
            return Err(BasketError::BufferTooSmall {
                required: size as u64,
                provided: buf.len() as u64,
            });
        }

        let expected = slot.content_hash;
        let bytes = self
            .baskets
            .read_data(&header, slot.data_offset as u64, size)?;
        if self.baskets.digest(&bytes) != expected {
            warn!("Content hash mismatch reading file {}", file_tag);
            return Err(BasketError::HashMismatch(*file_tag));
        }
        buf[..size].copy_from_slice(&bytes);

        let now = self.clock.now();
        if let Some(slot) = header.slot_mut(slot_index) {
            slot.access_time = now;
        }
        self.baskets.write_header(&mut header)?;
        self.index.record_access(file_tag, now);

        self.total_reads += 1;
        self.record(
            JournalOperation::Read,
            *file_tag,
            header.shelf_id,
            size as u64,
            format!("read file from basket {}", header.tag),
            now,
        );

        Ok(size)
    }

    /// Soft-delete a file and quarantine its metadata
    ///
    /// The bytes stay in the basket until it is compacted.
    pub fn delete_file(&mut self, file_tag: &Tag) -> Result<()> {
        self.ensure_mounted()?;

        let (mut header, slot_index) = self.locate_file(file_tag)?;
        let now = self.clock.now();
        let slot = header.slots()[slot_index].clone();
        let size = slot.size as u64;

        self.quarantine.quarantine(GarbageItem::orphaned_file(
            slot.tag,
            header.shelf_id,
            size,
            slot.content_hash,
            &slot.filename,
            now,
        ));

        if let Some(slot) = header.slot_mut(slot_index) {
            slot.is_deleted = true;
            slot.modification_time = now;
        }
        header.file_count = header.file_count.saturating_sub(1);
        header.deleted_count += 1;
        header.used_space = header.used_space.saturating_sub(size);
        header.free_space += size;
        self.baskets.write_header(&mut header)?;

        self.index.remove(file_tag);
        self.index.set_fragmented(&header.tag, true);

        self.total_writes += 1;
        self.record(
            JournalOperation::Delete,
            *file_tag,
            header.shelf_id,
            size,
            format!("deleted '{}' from basket {}", slot.filename, header.tag),
            now,
        );
        debug!("Deleted file {} from basket {}", file_tag, header.tag);

        Ok(())
    }

    /// Compact a basket on demand
    pub fn compact_basket(&mut self, basket_tag: &Tag) -> Result<CompactionReport> {
        self.ensure_mounted()?;

        let mut header = self.baskets.read_header(&self.index, basket_tag)?;
        let now = self.clock.now();
        let report = self.run_compaction(&mut header, now)?;

        if !report.is_noop() {
            self.total_writes += 1;
            self.record(
                JournalOperation::Write,
                *basket_tag,
                header.shelf_id,
                report.reclaimed_bytes,
                format!("compacted basket, {} files moved", report.relocated.len()),
                now,
            );
        }

        Ok(report)
    }

    /// Live files of a basket in slot order
    pub fn list_files(&mut self, basket_tag: &Tag) -> Result<Vec<FileInfo>> {
        self.ensure_mounted()?;

        let header = self.baskets.read_header(&self.index, basket_tag)?;
        Ok(header.live_slots().map(FileInfo::from).collect())
    }

    /// Look up a live file by name within one basket
    pub fn find_file(&mut self, basket_tag: &Tag, filename: &str) -> Result<Option<FileInfo>> {
        self.ensure_mounted()?;

        let header = self.baskets.read_header(&self.index, basket_tag)?;
        Ok(header
            .find_live_by_name(filename)
            .map(|i| FileInfo::from(&header.slots()[i])))
    }

    pub fn basket_stats(&mut self, basket_tag: &Tag) -> Result<BasketStats> {
        self.ensure_mounted()?;

        Ok(self.baskets.read_header(&self.index, basket_tag)?.stats())
    }

    pub fn shelf(&self, shelf_id: u16) -> Option<&Shelf> {
        self.shelves.get(&shelf_id)
    }

    /// Shelves in id order
    pub fn shelves(&self) -> impl Iterator<Item = &Shelf> {
        self.shelves.values()
    }

    pub fn index(&self) -> &PositionIndex {
        &self.index
    }

    pub fn quarantine(&self) -> &QuarantineZone {
        &self.quarantine
    }

    pub fn stats(&self) -> WarehouseStats {
        let basket_count = self
            .index
            .entries()
            .iter()
            .filter(|entry| entry.kind == ContainerKind::Basket)
            .count();

        WarehouseStats {
            state: self.state,
            shelf_count: self.shelves.len(),
            basket_count,
            file_count: self.index.len() - basket_count,
            index_entries: self.index.len(),
            index_capacity: self.index.capacity(),
            quarantined_items: self.quarantine.len(),
            quarantined_bytes: self.quarantine.total_size(),
            total_reads: self.total_reads,
            total_writes: self.total_writes,
            journal_sequence: self.journal_sequence,
        }
    }

    /// Walk every basket and file and report every inconsistency found
    ///
    /// Headers are re-read from the physical store, bypassing the cache.
    pub fn check_integrity(&mut self) -> Result<IntegrityReport> {
        self.ensure_mounted()?;
        self.baskets.clear_cache();

        let mut report = IntegrityReport::default();
        let basket_tags: Vec<Tag> = self
            .index
            .entries()
            .iter()
            .filter(|entry| entry.kind == ContainerKind::Basket)
            .map(|entry| entry.tag)
            .collect();

        for basket_tag in basket_tags {
            report.baskets_checked += 1;
            let header = match self.baskets.read_header(&self.index, &basket_tag) {
                Ok(header) => header,
                Err(e) => {
                    report.flag(basket_tag, e.to_string());
                    continue;
                }
            };
            self.check_basket(&header, &mut report);
        }

        for entry in self.index.entries() {
            if entry.kind != ContainerKind::BasketFile {
                continue;
            }
            if let Err(e) = self.index.find_owning_basket(entry) {
                report.flag(entry.tag, e.to_string());
            }
        }

        if !report.is_clean() {
            warn!(
                "Integrity check found {} violations",
                report.violations.len()
            );
        }
        Ok(report)
    }

    fn check_basket(&mut self, header: &BasketHeader, report: &mut IntegrityReport) {
        let tag = header.tag;
        if !header.space_is_consistent() {
            report.flag(
                tag,
                format!(
                    "used {} + free {} != basket size {}",
                    header.used_space, header.free_space, header.basket_size
                ),
            );
        }
        if header.data_end < header.used_space || header.data_end > header.basket_size {
            report.flag(tag, format!("data end {} out of range", header.data_end));
        }

        let live = header.live_slots().count();
        if header.file_count as usize != live {
            report.flag(
                tag,
                format!("file count {} but {} live slots", header.file_count, live),
            );
        }
        let deleted = header.deleted_with_data();
        if header.deleted_count as usize != deleted {
            report.flag(
                tag,
                format!(
                    "deleted count {} but {} deleted slots hold data",
                    header.deleted_count, deleted
                ),
            );
        }

        for slot in header.live_slots() {
            report.files_checked += 1;
            match self.index.lookup(&slot.tag) {
                Some(entry)
                    if entry.kind == ContainerKind::BasketFile
                        && entry.shelf_id == header.shelf_id
                        && entry.physical_offset == header.physical_offset => {}
                Some(_) => report.flag(slot.tag, "index entry points elsewhere"),
                None => report.flag(slot.tag, "live slot has no index entry"),
            }

            match self
                .baskets
                .read_data(header, slot.data_offset as u64, slot.size as usize)
            {
                Ok(bytes) if self.baskets.digest(&bytes) != slot.content_hash => {
                    report.flag(slot.tag, "content hash mismatch")
                }
                Ok(_) => {}
                Err(e) => report.flag(slot.tag, format!("unreadable data: {}", e)),
            }
        }
    }

    /// Resolve a file tag to its owning basket's header and slot index
    fn locate_file(&mut self, file_tag: &Tag) -> Result<(BasketHeader, usize)> {
        let entry = self
            .index
            .lookup(file_tag)
            .filter(|entry| entry.kind == ContainerKind::BasketFile)
            .ok_or(BasketError::FileNotFound(*file_tag))?;
        let basket_tag = self.index.find_owning_basket(entry)?;

        let header = self.baskets.read_header(&self.index, &basket_tag)?;
        let slot_index = header
            .find_live_slot(file_tag)
            .ok_or(BasketError::FileNotFound(*file_tag))?;
        Ok((header, slot_index))
    }

    /// Compact a basket and bring the index in line with its header
    ///
    /// A failed pass may already have moved some files, so the offsets are
    /// synced either way.
    fn run_compaction(&mut self, header: &mut BasketHeader, now: u64) -> Result<CompactionReport> {
        let result = compactor::compact(header, &mut self.baskets, now);
        for slot in header.live_slots() {
            self.index.set_internal_offset(&slot.tag, slot.data_offset);
        }
        match &result {
            Ok(_) => self.index.set_fragmented(&header.tag, false),
            Err(e) => warn!("Compaction of basket {} failed: {}", header.tag, e),
        }
        result
    }

    /// Append a journal entry; failures are logged, never returned
    fn record(
        &mut self,
        operation: JournalOperation,
        target_tag: Tag,
        shelf_id: u16,
        data_size: u64,
        description: String,
        now: u64,
    ) {
        self.journal_sequence += 1;
        let entry = JournalEntry {
            sequence_number: self.journal_sequence,
            timestamp: now,
            operation,
            target_tag,
            shelf_id,
            data_size,
            description,
        };

        let result = entry
            .to_bytes()
            .and_then(|bytes| self.journal.append(Subsystem::WarehousingEngine, &bytes));
        if let Err(e) = result {
            warn!(
                "Journal append failed for entry {}: {}",
                entry.sequence_number, e
            );
        }
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(BasketError::InvalidParameter("filename is empty".to_string()));
    }
    if filename.len() >= MAX_FILENAME_LENGTH {
        return Err(BasketError::InvalidParameter(format!(
            "filename is {} bytes, limit is {}",
            filename.len(),
            MAX_FILENAME_LENGTH - 1
        )));
    }
    // Stored zero-terminated
    if filename.contains('\0') {
        return Err(BasketError::InvalidParameter(
            "filename contains a NUL byte".to_string(),
        ));
    }
    Ok(())
}

/// Both the free-byte count and the append cursor leave room for `size`
fn has_room(header: &BasketHeader, size: u64) -> bool {
    header.free_space >= size && header.data_end + size <= header.basket_size
}
