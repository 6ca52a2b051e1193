use core::fmt::{self, Display};

use xlat_interface::{MemAttr, PhysAddr, VirtAddr, BYTES_1G};

/// Granularity used when a region does not ask for a smaller one.
pub const DEFAULT_GRANULARITY: usize = BYTES_1G;

/// A contiguous virtual range mapped onto a contiguous physical range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub pa: PhysAddr,
    pub va: VirtAddr,
    pub size: usize,
    pub attrs: MemAttr,
    /// Largest block size the region may be mapped with: 1 GiB, 2 MiB or 4 KiB.
    pub granularity: usize,
    /// Set by the context for regions added through the dynamic API.
    pub dynamic: bool,
}

impl Region {
    pub const fn new(pa: PhysAddr, va: VirtAddr, size: usize, attrs: MemAttr) -> Self {
        Self {
            pa,
            va,
            size,
            attrs,
            granularity: DEFAULT_GRANULARITY,
            dynamic: false,
        }
    }

    /// Maps `pa` at the same virtual address.
    pub const fn flat(pa: PhysAddr, size: usize, attrs: MemAttr) -> Self {
        Self::new(pa, VirtAddr::from_usize(pa.as_usize()), size, attrs)
    }

    pub const fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Last virtual address covered by the region. The region must not be empty.
    pub const fn end_va(&self) -> usize {
        self.va.as_usize() + (self.size - 1)
    }

    /// Last physical address covered by the region. The region must not be empty.
    pub const fn end_pa(&self) -> usize {
        self.pa.as_usize() + (self.size - 1)
    }

    pub(crate) fn va_pa_offset(&self) -> usize {
        self.va.as_usize().wrapping_sub(self.pa.as_usize())
    }

    /// Physical address `vaddr` translates to under this region.
    ///
    /// Also used for `vaddr` below the region start, where the result only
    /// matters for its alignment.
    pub(crate) fn pa_of(&self, vaddr: usize) -> usize {
        vaddr.wrapping_sub(self.va_pa_offset())
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VA:{:#x} PA:{:#x} size:{:#x} attr:{} granularity:{:#x}{}",
            self.va.as_usize(),
            self.pa.as_usize(),
            self.size,
            self.attrs,
            self.granularity,
            if self.dynamic { " (dynamic)" } else { "" }
        )
    }
}
