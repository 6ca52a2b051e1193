#![no_std]

mod attr;
mod error;
mod level;

pub use attr::*;
pub use error::*;
pub use level::*;
pub use memory_addr::*;

/// The exception level whose stage 1 translation the tables describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Shared EL1 and EL0 translation. The only regime with unprivileged access.
    El1El0,
    El2,
    El3,
}

impl Regime {
    pub const fn has_user(&self) -> bool {
        matches!(self, Regime::El1El0)
    }
}

impl core::fmt::Display for Regime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Regime::El1El0 => write!(f, "EL1&0"),
            Regime::El2 => write!(f, "EL2"),
            Regime::El3 => write!(f, "EL3"),
        }
    }
}

/// What a raw descriptor refers to at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescKind {
    Invalid,
    /// Maps memory directly: a block, or a page at the last level.
    Block,
    /// Points at a next-level table. Never reported at the last level.
    Table,
}

/// Encodes and decodes the raw 64-bit descriptors of one table format.
///
/// All functions are stateless; the table engine is generic over the codec
/// and never looks at descriptor bits itself.
pub trait DescriptorCodec {
    /// The all-zero invalid descriptor.
    const INVALID: u64 = 0;

    /// Leaf descriptor mapping `paddr` with `attrs` at `level`.
    ///
    /// `paddr` must be aligned to the block size of `level`.
    fn block(attrs: MemAttr, paddr: PhysAddr, level: usize, regime: Regime) -> u64;

    /// Table descriptor pointing at the next-level table at `paddr`.
    fn table(paddr: PhysAddr) -> u64;

    fn kind(desc: u64, level: usize) -> DescKind;

    fn output_address(desc: u64) -> PhysAddr;

    /// Recovers the attributes a leaf descriptor was built from.
    ///
    /// `decode(block(effective(a, r), ..), r) == effective(a, r)` for
    /// every attribute set the format can express.
    fn decode(desc: u64, regime: Regime) -> MemAttr;

    /// The attributes that would actually be encoded for `attrs` in `regime`.
    fn effective(attrs: MemAttr, regime: Regime) -> MemAttr {
        let _ = regime;
        attrs
    }
}

/// Architecture maintenance hooks used while editing live tables.
pub trait ArchOps {
    /// Invalidates TLB entries for one virtual address in `regime`.
    fn invalidate_va(&self, vaddr: VirtAddr, regime: Regime);

    /// Waits for outstanding TLB invalidations to complete.
    fn invalidate_sync(&self);

    /// Orders prior table writes before subsequent translation table walks.
    fn store_barrier(&self);

    /// Cleans the data cache lines covering `[addr, addr + size)`.
    fn clean_dcache_range(&self, addr: usize, size: usize);

    fn mmu_enabled(&self, regime: Regime) -> bool;

    /// Highest physical address the hardware can output.
    fn max_supported_pa(&self) -> usize;
}
