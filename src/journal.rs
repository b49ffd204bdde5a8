//! Append-only journal of basket operations
//!
//! Every basket-affecting operation produces one [`JournalEntry`], encoded
//! with bincode and handed to a [`Journal`] under a [`Subsystem`] key. The
//! core never reads the journal back; [`MemoryJournal`] and
//! [`FileJournal::replay`] exist for inspection and recovery tooling.
//!
//! File journal framing:
//!
//! ```text
//! ┌──────────────┬──────────────┬───────────┬─────────────┐
//! │ len: u32 LE  │ crc32: u32 LE│ subsystem │ record      │
//! │ (record len) │ (sub+record) │ u8        │ len bytes   │
//! └──────────────┴──────────────┴───────────┴─────────────┘
//! ```

use crate::error::{BasketError, Result};
use crate::tag::Tag;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Journal key identifying the producing subsystem
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subsystem {
    /// Basket management (the only producer in this crate)
    WarehousingEngine = 1,
}

impl Subsystem {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Subsystem::WarehousingEngine),
            _ => None,
        }
    }
}

/// Kind of operation recorded
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOperation {
    Write = 0,
    Read = 1,
    Delete = 2,
}

/// Single journal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonic per-warehouse sequence number
    pub sequence_number: u64,
    /// Microseconds since the Unix epoch
    pub timestamp: u64,
    pub operation: JournalOperation,
    pub target_tag: Tag,
    pub shelf_id: u16,
    pub data_size: u64,
    pub description: String,
}

impl JournalEntry {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Durable append-only log
pub trait Journal: Send {
    fn append(&mut self, subsystem: Subsystem, record: &[u8]) -> Result<()>;
}

/// Journal kept in memory
///
/// Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    records: Arc<Mutex<Vec<(Subsystem, Vec<u8>)>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Decode every record as a [`JournalEntry`]
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        self.records
            .lock()
            .iter()
            .map(|(_, record)| JournalEntry::from_bytes(record))
            .collect()
    }
}

impl Journal for MemoryJournal {
    fn append(&mut self, subsystem: Subsystem, record: &[u8]) -> Result<()> {
        self.records.lock().push((subsystem, record.to_vec()));
        Ok(())
    }
}

/// Journal appended to a single file with CRC-checked frames
pub struct FileJournal {
    file: File,
    path: PathBuf,
}

const FRAME_HEADER_SIZE: usize = 9;

fn frame_crc(subsystem: u8, record: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[subsystem]);
    hasher.update(record);
    hasher.finalize()
}

impl FileJournal {
    /// Open a journal file for appending, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(FileJournal {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every frame, verifying checksums
    ///
    /// A torn final frame (shorter than its declared length) is ignored, as
    /// it can only come from an interrupted append.
    pub fn replay<P: AsRef<Path>>(path: P) -> Result<Vec<(Subsystem, Vec<u8>)>> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset + FRAME_HEADER_SIZE <= bytes.len() {
            let len = u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]) as usize;
            let crc = u32::from_le_bytes([
                bytes[offset + 4],
                bytes[offset + 5],
                bytes[offset + 6],
                bytes[offset + 7],
            ]);
            let subsystem_byte = bytes[offset + 8];
            let start = offset + FRAME_HEADER_SIZE;
            if start + len > bytes.len() {
                tracing::warn!("Ignoring torn journal frame at offset {}", offset);
                break;
            }

            let record = &bytes[start..start + len];
            if frame_crc(subsystem_byte, record) != crc {
                return Err(BasketError::CorruptedData(format!(
                    "journal frame at offset {} fails its checksum",
                    offset
                )));
            }
            let subsystem = Subsystem::from_u8(subsystem_byte).ok_or_else(|| {
                BasketError::CorruptedData(format!("unknown journal subsystem {}", subsystem_byte))
            })?;

            records.push((subsystem, record.to_vec()));
            offset = start + len;
        }

        Ok(records)
    }
}

impl Journal for FileJournal {
    fn append(&mut self, subsystem: Subsystem, record: &[u8]) -> Result<()> {
        let len = u32::try_from(record.len()).map_err(|_| {
            BasketError::InvalidParameter(format!(
                "journal record of {} bytes is too large",
                record.len()
            ))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + record.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&frame_crc(subsystem as u8, record).to_le_bytes());
        frame.push(subsystem as u8);
        frame.extend_from_slice(record);

        self.file.write_all(&frame)?;
        self.file.flush()?;
        Ok(())
    }
}
