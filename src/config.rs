//! Warehouse configuration
//!
//! Loaded from TOML and validated before a warehouse is built:
//!
//! ```toml
//! state_path = "/var/lib/baskets/state.json"
//!
//! [index]
//! max_entries = 4096
//!
//! [quarantine]
//! max_items = 1024
//!
//! [cache]
//! header_capacity = 32
//!
//! [[shelves]]
//! id = 0
//! physical_start = 0
//! total_size = 16777216
//! max_baskets = 64
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

pub const DEFAULT_INDEX_ENTRIES: usize = 4096;
pub const DEFAULT_QUARANTINE_ITEMS: usize = 1024;
pub const DEFAULT_HEADER_CACHE: usize = 32;
pub const DEFAULT_SHELF_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_MAX_BASKETS: u32 = 64;

/// Static description of one shelf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShelfConfig {
    pub id: u16,

    /// Offset of the shelf's first byte on its physical device
    #[serde(default)]
    pub physical_start: u64,

    #[validate(range(min = 1))]
    pub total_size: u64,

    #[validate(range(min = 1))]
    pub max_baskets: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct IndexConfig {
    #[validate(range(min = 1))]
    pub max_entries: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            max_entries: DEFAULT_INDEX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QuarantineConfig {
    pub max_items: usize,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        QuarantineConfig {
            max_items: DEFAULT_QUARANTINE_ITEMS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Number of basket headers kept in the LRU cache
    #[validate(range(min = 1))]
    pub header_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            header_capacity: DEFAULT_HEADER_CACHE,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_shelf_ids"))]
pub struct WarehouseConfig {
    /// Where index, shelf counters and quarantine are saved on unmount
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    #[serde(default)]
    #[validate(nested)]
    pub index: IndexConfig,

    #[serde(default)]
    #[validate(nested)]
    pub quarantine: QuarantineConfig,

    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,

    #[validate(length(min = 1), nested)]
    pub shelves: Vec<ShelfConfig>,
}

fn validate_shelf_ids(config: &WarehouseConfig) -> std::result::Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for shelf in &config.shelves {
        if !seen.insert(shelf.id) {
            let mut err = ValidationError::new("duplicate_shelf_id");
            err.message = Some(format!("shelf id {} appears more than once", shelf.id).into());
            return Err(err);
        }
    }
    Ok(())
}

impl WarehouseConfig {
    /// Configuration with the given shelves and default limits
    pub fn with_shelves(shelves: Vec<ShelfConfig>) -> Self {
        WarehouseConfig {
            state_path: None,
            index: IndexConfig::default(),
            quarantine: QuarantineConfig::default(),
            cache: CacheConfig::default(),
            shelves,
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: WarehouseConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::with_shelves(vec![ShelfConfig {
            id: 0,
            physical_start: 0,
            total_size: DEFAULT_SHELF_SIZE,
            max_baskets: DEFAULT_MAX_BASKETS,
        }])
    }
}
