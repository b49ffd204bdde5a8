//! # Basket - Small-File Packing Store
//!
//! `basket-rs` packs many small files into fixed-size containers
//! ("baskets") carved from larger physical regions ("shelves"), instead of
//! paying a full storage unit per file.
//!
//! ## Features
//!
//! - **Fixed 256KB baskets** with 64 file slots each, files up to 64KB
//! - **Tag addressing**: every basket and file gets a 128-bit tag, never reused
//! - **Position index** mapping tags to shelf, offset and container kind
//! - **SHA-256 integrity** over every basket header and every file's content
//! - **Soft delete + quarantine**: deleted files stay recoverable until compaction
//! - **Compaction** slides live bytes down and reclaims the gaps
//! - **Journal** of every basket-affecting operation
//!
//! ## Quick Start
//!
//! ```rust
//! use basket_rs::{Result, Warehouse, WarehouseConfig};
//!
//! # fn main() -> Result<()> {
//! let mut warehouse = Warehouse::new(WarehouseConfig::default())?;
//! warehouse.mount()?;
//!
//! let basket = warehouse.create_basket(0)?;
//! let file = warehouse.add_file(&basket, "hello.txt", b"Hello, basket!")?;
//!
//! let mut buf = [0u8; 64];
//! let n = warehouse.read_file(&file, &mut buf)?;
//! assert_eq!(&buf[..n], b"Hello, basket!");
//!
//! warehouse.delete_file(&file)?;
//! assert!(warehouse.quarantine().find(&file).is_some());
//!
//! warehouse.unmount()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Disk-Backed Warehouse
//!
//! ```rust,no_run
//! use basket_rs::{FileJournal, FileStore, Result, Warehouse, WarehouseConfig};
//!
//! # fn main() -> Result<()> {
//! let config = WarehouseConfig::from_file("warehouse.toml")?;
//! let mut warehouse = Warehouse::builder(config)
//!     .store(FileStore::open("/var/lib/baskets")?)
//!     .journal(FileJournal::open("/var/lib/baskets/journal.log")?)
//!     .build()?;
//!
//! // Loads the saved index and counters if `state_path` exists
//! warehouse.mount()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Warehouse (create / add / read / delete)    │
//! ├──────────────┬──────────────┬───────────────┤
//! │ PositionIndex│ BasketStore  │ QuarantineZone│
//! │ tag → where  │ headers, I/O │ deleted files │
//! │              │ LRU cache    │               │
//! │              ├──────────────┤               │
//! │              │ Compactor    │               │
//! ├──────────────┴──────────────┴───────────────┤
//! │ PhysicalStore · Journal · Clock · Tags · Hash│
//! └─────────────────────────────────────────────┘
//!
//! Shelf 0: [basket][basket][basket] ... bump-allocated, never reused
//! ```

pub mod basket;
pub mod clock;
pub mod compactor;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod io;
pub mod journal;
pub mod quarantine;
pub mod shelf;
pub mod tag;
pub mod warehouse;

pub use basket::{
    BasketHeader, BasketStats, DataType, FileSlot, SlotState, BASKET_DEFAULT_SIZE,
    BASKET_MAX_FILES, BASKET_MAX_FILE_SIZE, HEADER_SIZE, MAX_FILENAME_LENGTH,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compactor::CompactionReport;
pub use config::{CacheConfig, IndexConfig, QuarantineConfig, ShelfConfig, WarehouseConfig};
pub use error::{BasketError, ErrorKind, Result};
pub use hash::{ContentHash, ContentHasher, Sha256Hasher};
pub use index::{ContainerKind, PositionEntry, PositionIndex};
pub use io::{FileStore, MemoryStore, PhysicalStore};
pub use journal::{
    FileJournal, Journal, JournalEntry, JournalOperation, MemoryJournal, Subsystem,
};
pub use quarantine::{GarbageCategory, GarbageItem, QuarantineZone};
pub use shelf::Shelf;
pub use tag::{RandomTagGenerator, Tag, TagGenerator};
pub use warehouse::{
    FileInfo, IntegrityReport, IntegrityViolation, MountState, Warehouse, WarehouseBuilder,
    WarehouseStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
