//! Per-entry decisions taken while mapping or unmapping a region.

use xlat_interface::{block_mask, block_size, DescKind, MAX_LEVEL, MIN_BLOCK_LEVEL};

use crate::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAction {
    /// Leave the entry alone.
    None,
    /// Write a block or page descriptor.
    WriteBlock,
    /// Allocate a sub-table, hook it up and descend into it.
    CreateTable,
    RecurseIntoTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmapAction {
    None,
    /// Invalidate the descriptor.
    EraseEntry,
    RecurseIntoTable,
}

/// Bounds of the entry starting at `entry_va`, inclusive.
fn entry_bounds(entry_va: usize, level: usize) -> (usize, usize) {
    (entry_va, entry_va + (block_size(level) - 1))
}

/// What to do with the entry covering `[entry_va, entry_va + block_size(level))`
/// when mapping `region`, given the entry's current kind.
///
/// `dest_pa` is the physical address `entry_va` translates to under `region`.
///
/// # Panics
///
/// Panics if the region covers part of an existing block. The registry never
/// lets that happen.
pub fn map_action(
    region: &Region,
    kind: DescKind,
    dest_pa: usize,
    entry_va: usize,
    level: usize,
) -> MapAction {
    let (start, end) = entry_bounds(entry_va, level);
    let region_start = region.va.as_usize();
    let region_end = region.end_va();

    if region_start <= start && region_end >= end {
        if level == MAX_LEVEL {
            return match kind {
                DescKind::Invalid => MapAction::WriteBlock,
                // mapped by another region already
                _ => MapAction::None,
            };
        }
        match kind {
            DescKind::Invalid => {
                if level < MIN_BLOCK_LEVEL
                    || dest_pa & block_mask(level) != 0
                    || region.granularity < block_size(level)
                {
                    MapAction::CreateTable
                } else {
                    MapAction::WriteBlock
                }
            }
            DescKind::Table => MapAction::RecurseIntoTable,
            DescKind::Block => MapAction::None,
        }
    } else if region_start <= end && region_end >= start {
        assert!(level < MAX_LEVEL, "page only partly covered by {region}");
        match kind {
            DescKind::Invalid => MapAction::CreateTable,
            DescKind::Table => MapAction::RecurseIntoTable,
            DescKind::Block => panic!("{region} covers part of the block at {start:#x}"),
        }
    } else {
        MapAction::None
    }
}

/// What to do with an entry when unmapping `[va, end]`.
pub fn unmap_action(va: usize, end: usize, kind: DescKind, entry_va: usize, level: usize) -> UnmapAction {
    let (start, entry_end) = entry_bounds(entry_va, level);

    if va <= start && end >= entry_end {
        match kind {
            DescKind::Block => UnmapAction::EraseEntry,
            DescKind::Table => UnmapAction::RecurseIntoTable,
            DescKind::Invalid => UnmapAction::None,
        }
    } else if va <= entry_end && end >= start {
        match kind {
            DescKind::Table => UnmapAction::RecurseIntoTable,
            _ => UnmapAction::None,
        }
    } else {
        UnmapAction::None
    }
}
