//! Error types for basket operations

use crate::tag::Tag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BasketError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Buffer too small: file needs {required} bytes, buffer holds {provided}")]
    BufferTooSmall { required: u64, provided: u64 },

    #[error("System is not mounted")]
    SystemNotMounted,

    #[error("Shelf {shelf_id} is full ({basket_count}/{max_baskets} baskets)")]
    ShelfFull {
        shelf_id: u16,
        basket_count: u32,
        max_baskets: u32,
    },

    #[error("Not enough space on shelf {shelf_id}: need {needed} bytes, {available} free")]
    DiskFull {
        shelf_id: u16,
        needed: u64,
        available: u64,
    },

    #[error("Basket {0} is full")]
    BasketFull(Tag),

    #[error("File not found: {0}")]
    FileNotFound(Tag),

    #[error("Basket not found: {0}")]
    BasketNotFound(Tag),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Basket header hash mismatch for {0}")]
    HeaderHashMismatch(Tag),

    #[error("Content hash mismatch for file {0}")]
    HashMismatch(Tag),

    #[error("Position index is full ({0} entries)")]
    OutOfMemory(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(#[from] validator::ValidationErrors),
}

/// Classification of a [`BasketError`] independent of its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    SystemNotMounted,
    ShelfFull,
    DiskFull,
    BasketFull,
    FileNotFound,
    CorruptedData,
    HashMismatch,
    OutOfMemory,
    Io,
    Config,
    Serialization,
}

impl BasketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BasketError::InvalidParameter(_) | BasketError::BufferTooSmall { .. } => {
                ErrorKind::InvalidParameter
            }
            BasketError::SystemNotMounted => ErrorKind::SystemNotMounted,
            BasketError::ShelfFull { .. } => ErrorKind::ShelfFull,
            BasketError::DiskFull { .. } => ErrorKind::DiskFull,
            BasketError::BasketFull(_) => ErrorKind::BasketFull,
            BasketError::FileNotFound(_) | BasketError::BasketNotFound(_) => {
                ErrorKind::FileNotFound
            }
            BasketError::CorruptedData(_) | BasketError::HeaderHashMismatch(_) => {
                ErrorKind::CorruptedData
            }
            BasketError::HashMismatch(_) => ErrorKind::HashMismatch,
            BasketError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            BasketError::Io(_) => ErrorKind::Io,
            BasketError::ConfigParse(_) | BasketError::ConfigValidation(_) => ErrorKind::Config,
            BasketError::Serialization(_) | BasketError::Encoding(_) => ErrorKind::Serialization,
        }
    }

    /// Size the caller's buffer must have, when the failure was an undersized read buffer
    pub fn required_size(&self) -> Option<u64> {
        match self {
            BasketError::BufferTooSmall { required, .. } => Some(*required),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BasketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_too_small_is_invalid_parameter() {
        let err = BasketError::BufferTooSmall {
            required: 100,
            provided: 10,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.required_size(), Some(100));
    }

    #[test]
    fn test_basket_not_found_kind() {
        let err = BasketError::BasketNotFound(Tag::from_bytes([7; 16]));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.required_size(), None);
    }

    #[test]
    fn test_header_hash_mismatch_is_corruption() {
        let err = BasketError::HeaderHashMismatch(Tag::from_bytes([1; 16]));
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
        assert!(err.to_string().contains("hash mismatch"));
    }
}
