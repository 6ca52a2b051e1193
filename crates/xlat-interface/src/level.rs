//! Geometry of the 4 KiB granule, four-level translation scheme.

use memory_addr::VirtAddr;

pub const PAGE_SHIFT: usize = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Bits of virtual address resolved by one table.
pub const TABLE_SHIFT: usize = 9;
pub const TABLE_ENTRIES: usize = 1 << TABLE_SHIFT;
pub const TABLE_SIZE: usize = TABLE_ENTRIES * core::mem::size_of::<u64>();

pub const MAX_LEVEL: usize = 3;
/// Lowest level at which a block descriptor may be written.
pub const MIN_BLOCK_LEVEL: usize = 1;

pub const BYTES_1G: usize = 1 << 30;
pub const BYTES_2M: usize = 1 << 21;

pub const MIN_VA_SPACE_SIZE: usize = 1 << 25;
pub const MAX_VA_SPACE_SIZE: usize = 1 << 48;
pub const MAX_PA_SPACE_SIZE: usize = 1 << 48;

/// Number of address bits below the index of `level`.
pub const fn block_shift(level: usize) -> usize {
    PAGE_SHIFT + TABLE_SHIFT * (MAX_LEVEL - level)
}

/// Bytes covered by one entry of a table at `level`.
pub const fn block_size(level: usize) -> usize {
    1 << block_shift(level)
}

pub const fn block_mask(level: usize) -> usize {
    block_size(level) - 1
}

/// Index of `vaddr` within a full table at `level`.
pub const fn table_index(vaddr: usize, level: usize) -> usize {
    (vaddr >> block_shift(level)) & (TABLE_ENTRIES - 1)
}

/// Level of the root table for a virtual address space of `va_space_size` bytes.
pub const fn base_level(va_space_size: usize) -> usize {
    if va_space_size > 1 << 39 {
        0
    } else if va_space_size > 1 << 30 {
        1
    } else {
        2
    }
}

/// Number of entries the root table needs to cover `va_space_size` bytes.
pub const fn base_entries(va_space_size: usize) -> usize {
    va_space_size >> block_shift(base_level(va_space_size))
}

pub trait VaddrAtTableIndex {
    fn index_of_table(&self, level: usize) -> usize;
}

impl VaddrAtTableIndex for VirtAddr {
    fn index_of_table(&self, level: usize) -> usize {
        table_index(self.as_usize(), level)
    }
}
