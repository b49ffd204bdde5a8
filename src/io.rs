//! Physical storage for shelves
//!
//! A [`PhysicalStore`] reads and writes byte ranges at an offset within a
//! shelf. Two backends are provided: [`MemoryStore`] for tests and embedded
//! use, and [`FileStore`] which keeps one file per shelf.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Durable byte-range storage addressed by shelf and offset
pub trait PhysicalStore: Send {
    /// Read exactly `len` bytes starting at `offset`
    fn read(&mut self, shelf_id: u16, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `data` starting at `offset`, growing the shelf if needed
    fn write(&mut self, shelf_id: u16, offset: u64, data: &[u8]) -> Result<()>;

    /// Make all previous writes durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn short_read(shelf_id: u16, offset: u64, len: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!(
            "read of {} bytes at offset {} is past the end of shelf {}",
            len, offset, shelf_id
        ),
    )
}

/// In-memory shelves
///
/// Clones share the same backing buffers, so a test can keep a handle to
/// inspect or corrupt bytes after handing the store to a warehouse.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shelves: Arc<Mutex<HashMap<u16, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently backing a shelf
    pub fn shelf_len(&self, shelf_id: u16) -> usize {
        self.shelves.lock().get(&shelf_id).map_or(0, Vec::len)
    }

    /// Flip every bit of the byte at `offset` (test hook for corruption)
    pub fn corrupt_byte(&self, shelf_id: u16, offset: u64) {
        if let Some(buf) = self.shelves.lock().get_mut(&shelf_id) {
            if let Some(byte) = buf.get_mut(offset as usize) {
                *byte ^= 0xFF;
            }
        }
    }
}

impl PhysicalStore for MemoryStore {
    fn read(&mut self, shelf_id: u16, offset: u64, len: usize) -> Result<Vec<u8>> {
        let shelves = self.shelves.lock();
        let start = offset as usize;
        let buf = shelves
            .get(&shelf_id)
            .filter(|buf| start + len <= buf.len())
            .ok_or_else(|| short_read(shelf_id, offset, len))?;
        Ok(buf[start..start + len].to_vec())
    }

    fn write(&mut self, shelf_id: u16, offset: u64, data: &[u8]) -> Result<()> {
        let mut shelves = self.shelves.lock();
        let buf = shelves.entry(shelf_id).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(data);
        Ok(())
    }
}

/// Disk-backed shelves, one file per shelf inside a directory
pub struct FileStore {
    dir: PathBuf,
    files: HashMap<u16, File>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(FileStore {
            dir: dir.as_ref().to_path_buf(),
            files: HashMap::new(),
        })
    }

    /// Path of the file backing a shelf
    pub fn shelf_path(&self, shelf_id: u16) -> PathBuf {
        self.dir.join(format!("shelf-{:05}.bin", shelf_id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&mut self, shelf_id: u16) -> Result<&mut File> {
        let path = self.shelf_path(shelf_id);
        match self.files.entry(shelf_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)?;
                Ok(entry.insert(file))
            }
        }
    }
}

impl PhysicalStore for FileStore {
    fn read(&mut self, shelf_id: u16, offset: u64, len: usize) -> Result<Vec<u8>> {
        let file = self.file(shelf_id)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)
            .map_err(|_| short_read(shelf_id, offset, len))?;

        Ok(buffer)
    }

    fn write(&mut self, shelf_id: u16, offset: u64, data: &[u8]) -> Result<()> {
        let file = self.file(shelf_id)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_memory_write_and_read() {
        let mut store = MemoryStore::new();
        store.write(0, 10, b"Hello").unwrap();

        assert_eq!(store.shelf_len(0), 15);
        assert_eq!(store.read(0, 10, 5).unwrap(), b"Hello");
        assert_eq!(store.read(0, 0, 10).unwrap(), vec![0u8; 10]);
    }

    #[test]
    fn test_memory_read_past_end_fails() {
        let mut store = MemoryStore::new();
        store.write(3, 0, b"abc").unwrap();

        let err = store.read(3, 2, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(store.read(4, 0, 1).is_err());
    }

    #[test]
    fn test_memory_clones_share_buffers() {
        let mut store = MemoryStore::new();
        let handle = store.clone();
        store.write(1, 0, b"data").unwrap();

        handle.corrupt_byte(1, 0);
        assert_ne!(store.read(1, 0, 4).unwrap(), b"data");
    }

    #[test]
    fn test_file_store_round_trip_and_reopen() {
        let temp = TempDir::new().unwrap();

        {
            let mut store = FileStore::open(temp.path()).unwrap();
            store.write(2, 4096, b"persisted").unwrap();
            store.flush().unwrap();
            assert!(store.shelf_path(2).exists());
        }

        let mut store = FileStore::open(temp.path()).unwrap();
        assert_eq!(store.read(2, 4096, 9).unwrap(), b"persisted");
        assert!(store.read(2, 8192, 16).is_err());
    }
}
