//! Shelves: fixed-capacity physical regions that baskets are carved from

use crate::config::ShelfConfig;
use crate::error::{BasketError, Result};
use serde::{Deserialize, Serialize};

/// Runtime view of a shelf: static limits plus running counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: u16,
    pub physical_start: u64,
    pub total_size: u64,
    pub max_baskets: u32,
    pub used_size: u64,
    pub free_size: u64,
    pub basket_count: u32,
}

impl Shelf {
    pub fn new(config: &ShelfConfig) -> Self {
        Shelf {
            id: config.id,
            physical_start: config.physical_start,
            total_size: config.total_size,
            max_baskets: config.max_baskets,
            used_size: 0,
            free_size: config.total_size,
            basket_count: 0,
        }
    }

    /// Check that one more basket of `basket_size` bytes fits
    ///
    /// The basket-count cap is checked before the byte cap.
    pub fn check_capacity(&self, basket_size: u64) -> Result<()> {
        if self.basket_count >= self.max_baskets {
            tracing::debug!(
                "Shelf {} is full (baskets: {}/{})",
                self.id,
                self.basket_count,
                self.max_baskets
            );
            return Err(BasketError::ShelfFull {
                shelf_id: self.id,
                basket_count: self.basket_count,
                max_baskets: self.max_baskets,
            });
        }

        if self.used_size + basket_size > self.total_size {
            tracing::debug!("Not enough space in shelf {} for basket", self.id);
            return Err(BasketError::DiskFull {
                shelf_id: self.id,
                needed: basket_size,
                available: self.free_size,
            });
        }

        Ok(())
    }

    /// Carry the usage counters of a saved shelf over onto this one
    ///
    /// Limits come from `self`, the configured shelf. A configuration that
    /// moves the shelf or shrinks it below the bytes already carved out is
    /// rejected.
    pub fn restore_usage(&self, saved: &Shelf) -> Result<Shelf> {
        if saved.physical_start != self.physical_start {
            return Err(BasketError::InvalidParameter(format!(
                "shelf {} starts at {} but saved baskets start at {}",
                self.id, self.physical_start, saved.physical_start
            )));
        }
        if saved.used_size > self.total_size {
            return Err(BasketError::InvalidParameter(format!(
                "shelf {} is configured for {} bytes but {} are in use",
                self.id, self.total_size, saved.used_size
            )));
        }

        if saved.total_size != self.total_size || saved.max_baskets != self.max_baskets {
            tracing::info!(
                "Shelf {} limits changed: {} -> {} bytes, {} -> {} baskets",
                self.id,
                saved.total_size,
                self.total_size,
                saved.max_baskets,
                self.max_baskets
            );
        }

        Ok(Shelf {
            used_size: saved.used_size,
            free_size: self.total_size - saved.used_size,
            basket_count: saved.basket_count,
            ..self.clone()
        })
    }

    /// Record a basket carved out of this shelf
    pub fn record_basket(&mut self, basket_size: u64) {
        self.basket_count += 1;
        self.used_size += basket_size;
        self.free_size = self.total_size - self.used_size;
    }
}
