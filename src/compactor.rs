//! Basket compaction
//!
//! Soft-deleted slots are zeroed and the live file bytes are slid down
//! toward the header, in ascending offset order, so the packed region ends
//! at `HEADER_SIZE + Σ live sizes`. Deletion has already moved the bytes
//! from used to free space, so compaction only moves the append cursor
//! (`data_end`) back to `used_space`; it never credits free space again.
//!
//! ```text
//! before:  [header][ a ][xxxx][ b ][xx][ c ]            <- data_end
//! after:   [header][ a ][ b ][ c ]   <- data_end == used_space
//! ```

use crate::basket::header::{BasketHeader, FileSlot, SlotState};
use crate::basket::store::BasketStore;
use crate::basket::HEADER_SIZE;
use crate::error::Result;
use crate::tag::Tag;
use tracing::{debug, warn};

/// Outcome of one compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// How far the append cursor moved back
    pub reclaimed_bytes: u64,
    /// Files whose data moved, with their new data offset
    pub relocated: Vec<(Tag, u32)>,
    /// Soft-deleted slots returned to the free pool
    pub slots_cleared: usize,
}

impl CompactionReport {
    pub fn is_noop(&self) -> bool {
        *self == CompactionReport::default()
    }
}

/// True when compaction would change nothing
pub fn is_compacted(header: &BasketHeader) -> bool {
    header.deleted_count == 0 && header.data_end == header.used_space
}

/// Compact `header` in place, moving file data through `baskets`, and
/// persist the result
///
/// A basket with nothing deleted and no gap is left untouched, header
/// included, so a second pass in a row is a no-op.
///
/// Every file that moves is read into memory before the first write, and
/// the header is persisted after each move. If a write fails, the file's
/// original bytes are put back at its old offset, so the stored header
/// never points a live slot at overwritten data.
pub fn compact(
    header: &mut BasketHeader,
    baskets: &mut BasketStore,
    now: u64,
) -> Result<CompactionReport> {
    if is_compacted(header) {
        return Ok(CompactionReport::default());
    }

    let data_end_before = header.data_end;
    let mut report = CompactionReport::default();

    let mut live: Vec<(usize, u64, usize)> = header
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_live())
        .map(|(i, slot)| (i, slot.data_offset as u64, slot.size as usize))
        .collect();
    live.sort_by_key(|&(_, offset, _)| offset);

    let mut moves = Vec::new();
    let mut cursor = HEADER_SIZE as u64;
    for (i, offset, size) in live {
        if offset != cursor {
            let bytes = baskets.read_data(header, offset, size)?;
            moves.push((i, offset, cursor, bytes));
        }
        cursor += size as u64;
    }

    for slot in header.slots_mut() {
        if slot.state() == SlotState::Deleted {
            *slot = FileSlot::empty();
            report.slots_cleared += 1;
        }
    }
    header.deleted_count = 0;

    // Destination never passes the source, and never reaches a file that
    // has not moved yet
    for (i, from, to, bytes) in moves {
        if let Err(e) = baskets.write_data(header, to, &bytes) {
            if let Err(restore) = baskets.write_data(header, from, &bytes) {
                warn!(
                    "Could not restore file data at offset {} in basket {}: {}",
                    from, header.tag, restore
                );
            }
            baskets.write_header(header)?;
            return Err(e);
        }

        if let Some(slot) = header.slot_mut(i) {
            slot.data_offset = to as u32;
            report.relocated.push((slot.tag, to as u32));
        }
        baskets.write_header(header)?;
    }

    header.data_end = cursor;
    header.compaction_count += 1;
    header.last_compaction = now;
    baskets.write_header(header)?;

    report.reclaimed_bytes = data_end_before.saturating_sub(cursor);
    debug!(
        "Compacted basket {}: reclaimed {} bytes, moved {} files",
        header.tag,
        report.reclaimed_bytes,
        report.relocated.len()
    );

    Ok(report)
}
