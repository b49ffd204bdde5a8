use crate::basket::{
    BASKET_DEFAULT_SIZE, BASKET_MAGIC, BASKET_MAX_FILES, BASKET_VERSION, FIXED_HEADER_SIZE,
    HEADER_SIZE, MAX_FILENAME_LENGTH, SLOT_SIZE,
};
use crate::error::{BasketError, Result};
use crate::hash::{ContentHash, ContentHasher, HASH_SIZE};
use crate::tag::{Tag, TAG_SIZE};
use serde::{Deserialize, Serialize};

/// Byte offset of the integrity hash inside the fixed header
const HASH_OFFSET: usize = FIXED_HEADER_SIZE - HASH_SIZE;

const FLAG_DELETED: u8 = 0x01;

/// Coarse content type, inferred from the filename extension
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Unknown = 0,
    Text = 1,
    Image = 2,
    Audio = 3,
    Video = 4,
    Archive = 5,
    Binary = 6,
}

impl DataType {
    /// Parse a data type from its byte value
    ///
    /// Unknown values map to `Unknown` for forward compatibility.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Text,
            2 => Self::Image,
            3 => Self::Audio,
            4 => Self::Video,
            5 => Self::Archive,
            6 => Self::Binary,
            _ => Self::Unknown,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Self::Unknown,
        };

        match ext.as_str() {
            "txt" | "md" | "csv" | "json" | "toml" | "xml" | "html" | "log" => Self::Text,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "svg" => Self::Image,
            "mp3" | "wav" | "flac" | "ogg" => Self::Audio,
            "mp4" | "mkv" | "avi" | "webm" => Self::Video,
            "zip" | "tar" | "gz" | "zst" | "xz" => Self::Archive,
            "bin" | "dat" | "exe" | "so" => Self::Binary,
            _ => Self::Unknown,
        }
    }
}

/// Allocation state of a file slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used, or zeroed by compaction
    Free,
    /// Holds a readable file
    Live,
    /// Soft-deleted; data still occupies the basket until compaction
    Deleted,
}

/// One fixed-position file entry inside a basket header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSlot {
    pub tag: Tag,
    pub filename: String,
    pub size: u32,
    /// Offset of the file data from the start of the basket
    pub data_offset: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub access_time: u64,
    pub content_hash: ContentHash,
    pub data_type: DataType,
    pub permissions: u16,
    pub is_deleted: bool,
}

impl FileSlot {
    /// A zeroed slot, marked deleted so the allocator treats it as available
    pub fn empty() -> Self {
        FileSlot {
            tag: Tag::NIL,
            filename: String::new(),
            size: 0,
            data_offset: 0,
            creation_time: 0,
            modification_time: 0,
            access_time: 0,
            content_hash: ContentHash::ZERO,
            data_type: DataType::Unknown,
            permissions: 0,
            is_deleted: true,
        }
    }

    pub fn state(&self) -> SlotState {
        match (self.is_deleted, self.size) {
            (false, _) => SlotState::Live,
            (true, 0) => SlotState::Free,
            (true, _) => SlotState::Deleted,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let start = out.len();

        out.extend_from_slice(self.tag.as_bytes());

        let mut name = [0u8; MAX_FILENAME_LENGTH];
        let bytes = self.filename.as_bytes();
        // Keep a terminating zero byte
        let len = bytes.len().min(MAX_FILENAME_LENGTH - 1);
        name[..len].copy_from_slice(&bytes[..len]);
        out.extend_from_slice(&name);

        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.data_offset.to_le_bytes());
        out.extend_from_slice(&self.creation_time.to_le_bytes());
        out.extend_from_slice(&self.modification_time.to_le_bytes());
        out.extend_from_slice(&self.access_time.to_le_bytes());
        out.extend_from_slice(self.content_hash.as_bytes());
        out.push(self.data_type as u8);
        out.push(if self.is_deleted { FLAG_DELETED } else { 0 });
        out.extend_from_slice(&self.permissions.to_le_bytes());

        // Pad to SLOT_SIZE
        out.resize(start + SLOT_SIZE, 0);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let tag = Tag::from_bytes(reader.array::<TAG_SIZE>());

        let name = reader.array::<MAX_FILENAME_LENGTH>();
        let end = name.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME_LENGTH);
        let filename = std::str::from_utf8(&name[..end])
            .map_err(|_| BasketError::CorruptedData("filename is not valid UTF-8".to_string()))?
            .to_string();

        let size = reader.u32();
        let data_offset = reader.u32();
        let creation_time = reader.u64();
        let modification_time = reader.u64();
        let access_time = reader.u64();
        let content_hash = ContentHash(reader.array::<HASH_SIZE>());
        let data_type = DataType::from_u8(reader.u8());
        let flags = reader.u8();
        let permissions = reader.u16();

        Ok(FileSlot {
            tag,
            filename,
            size,
            data_offset,
            creation_time,
            modification_time,
            access_time,
            content_hash,
            data_type,
            permissions,
            is_deleted: flags & FLAG_DELETED != 0,
        })
    }
}

/// Basket header: space accounting plus the fixed slot array
///
/// Invariants maintained by the warehouse:
/// - `used_space + free_space == basket_size`
/// - `file_count` equals the number of live slots
/// - `data_end >= used_space`, with equality right after compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketHeader {
    pub tag: Tag,
    pub shelf_id: u16,
    /// Offset of the basket's first byte on its shelf
    pub physical_offset: u64,
    pub basket_size: u64,
    pub used_space: u64,
    pub free_space: u64,
    /// Append cursor for new file data
    pub data_end: u64,
    pub file_count: u32,
    pub deleted_count: u32,
    pub creation_time: u64,
    pub last_compaction: u64,
    pub compaction_count: u32,
    pub basket_hash: ContentHash,
    slots: Vec<FileSlot>,
}

impl BasketHeader {
    /// Fresh header for an empty basket, every slot available
    pub fn new(tag: Tag, shelf_id: u16, physical_offset: u64, now: u64) -> Self {
        let used_space = HEADER_SIZE as u64;
        BasketHeader {
            tag,
            shelf_id,
            physical_offset,
            basket_size: BASKET_DEFAULT_SIZE,
            used_space,
            free_space: BASKET_DEFAULT_SIZE - used_space,
            data_end: used_space,
            file_count: 0,
            deleted_count: 0,
            creation_time: now,
            last_compaction: now,
            compaction_count: 0,
            basket_hash: ContentHash::ZERO,
            slots: vec![FileSlot::empty(); BASKET_MAX_FILES],
        }
    }

    pub fn slots(&self) -> &[FileSlot] {
        &self.slots
    }

    /// Mutable access to one slot; the slot count itself is fixed
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FileSlot> {
        self.slots.get_mut(index)
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [FileSlot] {
        &mut self.slots
    }

    /// Index of the live slot holding `tag`
    pub fn find_live_slot(&self, tag: &Tag) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_live() && slot.tag == *tag)
    }

    /// Index of the live slot named `filename`
    pub fn find_live_by_name(&self, filename: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_live() && slot.filename == filename)
    }

    pub fn live_slots(&self) -> impl Iterator<Item = &FileSlot> {
        self.slots.iter().filter(|slot| slot.is_live())
    }

    /// Number of soft-deleted slots still holding data
    pub fn deleted_with_data(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state() == SlotState::Deleted)
            .count()
    }

    pub fn space_is_consistent(&self) -> bool {
        self.used_space + self.free_space == self.basket_size
    }

    /// Hash of the encoded header with the hash field zeroed
    pub fn compute_hash(&self, hasher: &dyn ContentHasher) -> ContentHash {
        let mut bytes = self.to_bytes();
        bytes[HASH_OFFSET..HASH_OFFSET + HASH_SIZE].fill(0);
        hasher.digest(&bytes)
    }

    /// Recompute and store the integrity hash
    pub fn seal(&mut self, hasher: &dyn ContentHasher) {
        self.basket_hash = self.compute_hash(hasher);
    }

    pub fn verify(&self, hasher: &dyn ContentHasher) -> bool {
        self.compute_hash(hasher) == self.basket_hash
    }

    pub fn stats(&self) -> BasketStats {
        BasketStats {
            tag: self.tag,
            shelf_id: self.shelf_id,
            physical_offset: self.physical_offset,
            basket_size: self.basket_size,
            used_space: self.used_space,
            free_space: self.free_space,
            data_end: self.data_end,
            file_count: self.file_count,
            deleted_count: self.deleted_count,
            creation_time: self.creation_time,
            last_compaction: self.last_compaction,
            compaction_count: self.compaction_count,
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);

        bytes.extend_from_slice(&BASKET_MAGIC);
        bytes.extend_from_slice(&BASKET_VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.shelf_id.to_le_bytes());
        bytes.extend_from_slice(self.tag.as_bytes());
        bytes.extend_from_slice(&self.physical_offset.to_le_bytes());
        bytes.extend_from_slice(&self.basket_size.to_le_bytes());
        bytes.extend_from_slice(&self.used_space.to_le_bytes());
        bytes.extend_from_slice(&self.free_space.to_le_bytes());
        bytes.extend_from_slice(&self.data_end.to_le_bytes());
        bytes.extend_from_slice(&self.file_count.to_le_bytes());
        bytes.extend_from_slice(&self.deleted_count.to_le_bytes());
        bytes.extend_from_slice(&self.creation_time.to_le_bytes());
        bytes.extend_from_slice(&self.last_compaction.to_le_bytes());
        bytes.extend_from_slice(&self.compaction_count.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]); // reserved
        bytes.extend_from_slice(self.basket_hash.as_bytes());

        for slot in &self.slots {
            slot.encode(&mut bytes);
        }

        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BasketError::CorruptedData(format!(
                "basket header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut reader = ByteReader::new(&bytes[..FIXED_HEADER_SIZE]);

        if reader.array::<4>() != BASKET_MAGIC {
            return Err(BasketError::CorruptedData(
                "invalid basket magic".to_string(),
            ));
        }

        let version = reader.u16();
        if version != BASKET_VERSION {
            return Err(BasketError::CorruptedData(format!(
                "unsupported basket version {}",
                version
            )));
        }

        let shelf_id = reader.u16();
        let tag = Tag::from_bytes(reader.array::<TAG_SIZE>());
        let physical_offset = reader.u64();
        let basket_size = reader.u64();
        let used_space = reader.u64();
        let free_space = reader.u64();
        let data_end = reader.u64();
        let file_count = reader.u32();
        let deleted_count = reader.u32();
        let creation_time = reader.u64();
        let last_compaction = reader.u64();
        let compaction_count = reader.u32();
        let _reserved = reader.u32();
        let basket_hash = ContentHash(reader.array::<HASH_SIZE>());

        let slots = bytes[FIXED_HEADER_SIZE..HEADER_SIZE]
            .chunks_exact(SLOT_SIZE)
            .map(FileSlot::decode)
            .collect::<Result<Vec<_>>>()?;

        Ok(BasketHeader {
            tag,
            shelf_id,
            physical_offset,
            basket_size,
            used_space,
            free_space,
            data_end,
            file_count,
            deleted_count,
            creation_time,
            last_compaction,
            compaction_count,
            basket_hash,
            slots,
        })
    }
}

/// Read-only snapshot of a basket's accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketStats {
    pub tag: Tag,
    pub shelf_id: u16,
    pub physical_offset: u64,
    pub basket_size: u64,
    pub used_space: u64,
    pub free_space: u64,
    pub data_end: u64,
    pub file_count: u32,
    pub deleted_count: u32,
    pub creation_time: u64,
    pub last_compaction: u64,
    pub compaction_count: u32,
}

/// Little-endian cursor over a byte slice whose length was checked up front
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.array::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::DEFAULT_PERMISSIONS;
    use crate::error::ErrorKind;
    use crate::hash::Sha256Hasher;

    fn sample_header() -> BasketHeader {
        let mut header = BasketHeader::new(Tag::from_bytes([5; 16]), 2, 1 << 20, 1_000);
        let slot = header.slot_mut(3).unwrap();
        slot.tag = Tag::from_bytes([8; 16]);
        slot.filename = "notes.txt".to_string();
        slot.size = 42;
        slot.data_offset = HEADER_SIZE as u32;
        slot.creation_time = 1_001;
        slot.modification_time = 1_001;
        slot.access_time = 1_002;
        slot.content_hash = Sha256Hasher.digest(b"payload");
        slot.data_type = DataType::Text;
        slot.permissions = DEFAULT_PERMISSIONS;
        slot.is_deleted = false;
        header.file_count = 1;
        header.used_space += 42;
        header.free_space -= 42;
        header.data_end += 42;
        header
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(HEADER_SIZE, 22_656);
        let header = BasketHeader::new(Tag::NIL, 0, 0, 0);
        assert_eq!(header.to_bytes().len(), HEADER_SIZE);
        assert_eq!(header.slots().len(), BASKET_MAX_FILES);
    }

    #[test]
    fn test_new_header_accounting() {
        let header = BasketHeader::new(Tag::from_bytes([1; 16]), 0, 0, 77);
        assert_eq!(header.used_space, HEADER_SIZE as u64);
        assert_eq!(header.data_end, HEADER_SIZE as u64);
        assert!(header.space_is_consistent());
        assert_eq!(header.last_compaction, 77);
        assert!(header.slots().iter().all(|s| s.state() == SlotState::Free));
    }

    #[test]
    fn test_header_serialization() {
        let mut header = sample_header();
        header.seal(&Sha256Hasher);

        let decoded = BasketHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.slots()[3].filename, "notes.txt");
        assert_eq!(decoded.slots()[3].state(), SlotState::Live);
        assert_eq!(decoded.find_live_slot(&Tag::from_bytes([8; 16])), Some(3));
        assert!(decoded.verify(&Sha256Hasher));
    }

    #[test]
    fn test_hash_excludes_hash_field() {
        let mut header = sample_header();
        let before = header.compute_hash(&Sha256Hasher);
        header.seal(&Sha256Hasher);
        assert_eq!(header.compute_hash(&Sha256Hasher), before);
        assert!(header.verify(&Sha256Hasher));

        header.used_space += 1;
        assert!(!header.verify(&Sha256Hasher));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        let err = BasketHeader::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    #[test]
    fn test_invalid_version() {
        let mut bytes = sample_header().to_bytes();
        bytes[4] = 99;
        assert!(matches!(
            BasketHeader::from_bytes(&bytes),
            Err(BasketError::CorruptedData(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample_header().to_bytes();
        assert!(BasketHeader::from_bytes(&bytes[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn test_slot_states() {
        let mut slot = FileSlot::empty();
        assert_eq!(slot.state(), SlotState::Free);
        slot.size = 10;
        assert_eq!(slot.state(), SlotState::Deleted);
        slot.is_deleted = false;
        assert_eq!(slot.state(), SlotState::Live);
    }

    #[test]
    fn test_filename_truncated_to_field() {
        let mut header = BasketHeader::new(Tag::NIL, 0, 0, 0);
        header.slot_mut(0).unwrap().filename = "x".repeat(400);
        let decoded = BasketHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.slots()[0].filename.len(), MAX_FILENAME_LENGTH - 1);
    }

    #[test]
    fn test_data_type_from_filename() {
        assert_eq!(DataType::from_filename("a.txt"), DataType::Text);
        assert_eq!(DataType::from_filename("photo.JPG"), DataType::Image);
        assert_eq!(DataType::from_filename("archive.tar.gz"), DataType::Archive);
        assert_eq!(DataType::from_filename("README"), DataType::Unknown);
        assert_eq!(DataType::from_u8(200), DataType::Unknown);
    }
}
