//! Baskets: fixed-size containers packing many small files
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Basket (BASKET_DEFAULT_SIZE bytes)           │
//! ├──────────────────────────────────────────────┤
//! │ Fixed header (128 bytes)                     │
//! │  - Magic "BSKT", version, tag, shelf         │
//! │  - Space accounting, counters, timestamps    │
//! │  - SHA-256 over the header (hash zeroed)     │
//! ├──────────────────────────────────────────────┤
//! │ File slots (BASKET_MAX_FILES x 352 bytes)    │
//! ├──────────────────────────────────────────────┤
//! │ Packed file data, appended at `data_end`     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod header;
pub mod store;

pub use header::{BasketHeader, BasketStats, DataType, FileSlot, SlotState};
pub use store::BasketStore;

/// Size of every basket carved from a shelf
pub const BASKET_DEFAULT_SIZE: u64 = 256 * 1024;

/// Number of file slots in a basket header
pub const BASKET_MAX_FILES: usize = 64;

/// Largest file a basket accepts
pub const BASKET_MAX_FILE_SIZE: u32 = 64 * 1024;

/// Filenames must encode to strictly fewer bytes than this
pub const MAX_FILENAME_LENGTH: usize = 256;

/// Magic bytes opening every basket header
pub const BASKET_MAGIC: [u8; 4] = *b"BSKT";

/// On-disk header format version
pub const BASKET_VERSION: u16 = 1;

/// Size of the fixed part of the header
pub const FIXED_HEADER_SIZE: usize = 128;

/// Size of one encoded file slot
pub const SLOT_SIZE: usize = 352;

/// Size of the full header, slots included
pub const HEADER_SIZE: usize = FIXED_HEADER_SIZE + BASKET_MAX_FILES * SLOT_SIZE;

/// Default permissions given to new files
pub const DEFAULT_PERMISSIONS: u16 = 0o644;
