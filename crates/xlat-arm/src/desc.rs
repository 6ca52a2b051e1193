use core::fmt::{self, Debug};

use xlat_interface::{
    block_mask, DescKind, DescriptorCodec, MemAttr, MemType, PhysAddr, Regime, MAX_LEVEL,
};

use crate::AttrIndex;

bitflags::bitflags! {
    /// Bits of a stage 1 block, page or table descriptor that the codec writes.
    ///
    /// `SH_OUTER` and `SH_INNER` are the two encodings of the SH[9:8] field
    /// used here; `SH_INNER` includes the `SH_OUTER` bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorAttr: u64 {
        const VALID =           1 << 0;
        /// Table descriptor at levels 0-2, page descriptor at level 3.
        const TABLE_OR_PAGE =   1 << 1;
        /// AttrIndx[4:2], selects a MAIR attribute slot.
        const ATTR_INDX =       0b111 << 2;
        /// Output address is in the non-secure physical address space.
        const NS =              1 << 5;
        /// AP[1]. Grants EL0 access in EL1&0; RES1 in EL2 and EL3.
        const AP_EL0 =          1 << 6;
        /// AP[2].
        const AP_RO =           1 << 7;
        const SH_OUTER =        0b10 << 8;
        const SH_INNER =        0b11 << 8;
        /// Access flag. Clear means the first access faults.
        const AF =              1 << 10;
        /// Privileged execute-never, EL1&0 only.
        const PXN =             1 << 53;
        /// UXN in EL1&0, XN in EL2 and EL3.
        const XN =              1 << 54;
    }
}

impl DescriptorAttr {
    pub const fn from_attr_index(idx: AttrIndex) -> Self {
        Self::from_bits_retain((idx as u64) << 2)
    }

    /// Execute-never bits for `regime`. EL2 and EL3 only have a single XN bit.
    pub const fn execute_never(regime: Regime) -> Self {
        match regime {
            Regime::El1El0 => Self::PXN.union(Self::XN),
            _ => Self::XN,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PTE(u64);

impl PTE {
    const PHYS_ADDR_MASK: u64 = 0x0000_ffff_ffff_f000; // bits 12..48

    pub const fn empty() -> Self {
        PTE(0)
    }

    pub const fn new(paddr: usize, attr: DescriptorAttr) -> Self {
        PTE((paddr as u64 & Self::PHYS_ADDR_MASK) | attr.bits())
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 & DescriptorAttr::VALID.bits() != 0
    }

    /// A block at levels 1 and 2. Reserved at level 3.
    pub const fn is_block(&self) -> bool {
        self.0 & DescriptorAttr::TABLE_OR_PAGE.bits() == 0
    }

    pub const fn paddr(&self) -> usize {
        (self.0 & Self::PHYS_ADDR_MASK) as _
    }

    pub const fn attr(&self) -> DescriptorAttr {
        DescriptorAttr::from_bits_truncate(self.0)
    }

    pub const fn attr_index(&self) -> Option<AttrIndex> {
        AttrIndex::from_bits((self.0 >> 2) & 0b111)
    }
}

impl From<u64> for PTE {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PTE> for u64 {
    fn from(value: PTE) -> Self {
        value.0
    }
}

impl Debug for PTE {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PTE")
            .field("paddr", &format_args!("{:#x}", self.paddr()))
            .field("attr", &self.attr())
            .finish()
    }
}

/// Stage 1 VMSAv8-64 descriptors with a 4 KiB granule.
///
/// Leaf descriptors always carry the access flag. Normal cacheable memory is
/// inner shareable, everything else outer shareable.
pub struct Vmsav8;

impl DescriptorCodec for Vmsav8 {
    fn block(attrs: MemAttr, paddr: PhysAddr, level: usize, regime: Regime) -> u64 {
        debug_assert_eq!(paddr.as_usize() & block_mask(level), 0);

        let attrs = Self::effective(attrs, regime);
        let mut desc = DescriptorAttr::VALID | DescriptorAttr::AF;
        if level == MAX_LEVEL {
            desc |= DescriptorAttr::TABLE_OR_PAGE;
        }
        if attrs.contains(MemAttr::NS) {
            desc |= DescriptorAttr::NS;
        }
        if !attrs.contains(MemAttr::RW) {
            desc |= DescriptorAttr::AP_RO;
        }
        if attrs.contains(MemAttr::USER) || !regime.has_user() {
            desc |= DescriptorAttr::AP_EL0;
        }
        if attrs.contains(MemAttr::EXECUTE_NEVER) {
            desc |= DescriptorAttr::execute_never(regime);
        }
        desc |= match attrs.mem_type() {
            MemType::Device => {
                DescriptorAttr::from_attr_index(AttrIndex::Device) | DescriptorAttr::SH_OUTER
            }
            MemType::NonCacheable => {
                DescriptorAttr::from_attr_index(AttrIndex::NonCache) | DescriptorAttr::SH_OUTER
            }
            MemType::Normal => {
                DescriptorAttr::from_attr_index(AttrIndex::Normal) | DescriptorAttr::SH_INNER
            }
        };
        PTE::new(paddr.as_usize(), desc).bits()
    }

    fn table(paddr: PhysAddr) -> u64 {
        PTE::new(
            paddr.as_usize(),
            DescriptorAttr::VALID | DescriptorAttr::TABLE_OR_PAGE,
        )
        .bits()
    }

    fn kind(desc: u64, level: usize) -> DescKind {
        let pte = PTE::from(desc);
        if !pte.is_valid() {
            return DescKind::Invalid;
        }
        match (level == MAX_LEVEL, pte.is_block()) {
            (true, true) => DescKind::Invalid,
            (true, false) | (false, true) => DescKind::Block,
            (false, false) => DescKind::Table,
        }
    }

    fn output_address(desc: u64) -> PhysAddr {
        PTE::from(desc).paddr().into()
    }

    fn decode(desc: u64, regime: Regime) -> MemAttr {
        let pte = PTE::from(desc);
        let attr = pte.attr();
        let mut attrs = match pte.attr_index() {
            Some(AttrIndex::Normal) => MemAttr::empty(),
            Some(AttrIndex::NonCache) => MemAttr::NON_CACHEABLE,
            Some(AttrIndex::Device) | None => MemAttr::DEVICE,
        };
        if !attr.contains(DescriptorAttr::AP_RO) {
            attrs |= MemAttr::RW;
        }
        if regime.has_user() && attr.contains(DescriptorAttr::AP_EL0) {
            attrs |= MemAttr::USER;
        }
        if attr.contains(DescriptorAttr::NS) {
            attrs |= MemAttr::NS;
        }
        if attr.intersects(DescriptorAttr::execute_never(regime)) {
            attrs |= MemAttr::EXECUTE_NEVER;
        }
        attrs
    }

    fn effective(attrs: MemAttr, regime: Regime) -> MemAttr {
        let mut attrs = attrs;
        if attrs.contains(MemAttr::DEVICE) {
            attrs.remove(MemAttr::NON_CACHEABLE);
        }
        if !regime.has_user() {
            attrs.remove(MemAttr::USER);
        }
        // Writable memory and device memory are never executable.
        if attrs.contains(MemAttr::RW) || attrs.mem_type() == MemType::Device {
            attrs |= MemAttr::EXECUTE_NEVER;
        }
        attrs
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use xlat_interface::pa;

    #[test]
    fn test_table_desc() {
        let desc = Vmsav8::table(pa!(0x4000_1000));
        assert_eq!(desc, 0x4000_1003);
        assert_eq!(Vmsav8::kind(desc, 1), DescKind::Table);
        assert_eq!(Vmsav8::output_address(desc), pa!(0x4000_1000));
    }

    #[test]
    fn test_level3_block_is_reserved() {
        assert_eq!(Vmsav8::kind(0x4000_0001, 3), DescKind::Invalid);
        assert_eq!(Vmsav8::kind(0x4000_0001, 2), DescKind::Block);
        assert_eq!(Vmsav8::kind(0x4000_0003, 3), DescKind::Block);
        assert_eq!(Vmsav8::kind(0, 2), DescKind::Invalid);
    }

    #[test]
    fn test_effective() {
        assert_eq!(
            Vmsav8::effective(MemAttr::RW, Regime::El3),
            MemAttr::RW_DATA
        );
        assert_eq!(
            Vmsav8::effective(MemAttr::DEVICE | MemAttr::USER, Regime::El2),
            MemAttr::DEVICE | MemAttr::EXECUTE_NEVER
        );
        assert_eq!(
            Vmsav8::effective(MemAttr::CODE | MemAttr::USER, Regime::El1El0),
            MemAttr::USER
        );
    }
}
