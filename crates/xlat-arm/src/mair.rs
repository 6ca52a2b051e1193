use aarch64_cpu::registers::*;

/// Memory types selected by the `AttrIndx` field of a leaf descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrIndex {
    Device = 0,
    Normal = 1,
    NonCache = 2,
}

impl AttrIndex {
    pub const fn from_bits(idx: u64) -> Option<Self> {
        match idx {
            0 => Some(Self::Device),
            1 => Some(Self::Normal),
            2 => Some(Self::NonCache),
            _ => None,
        }
    }
}

/// MAIR value matching [`AttrIndex`].
pub const fn mair_value() -> u64 {
    // Device-nGnRE memory
    let attr0 = MAIR_EL1::Attr0_Device::nonGathering_nonReordering_EarlyWriteAck.value;
    // Normal memory
    let attr1 = MAIR_EL1::Attr1_Normal_Inner::WriteBack_NonTransient_ReadWriteAlloc.value
        | MAIR_EL1::Attr1_Normal_Outer::WriteBack_NonTransient_ReadWriteAlloc.value;
    let attr2 = MAIR_EL1::Attr2_Normal_Inner::NonCacheable.value
        | MAIR_EL1::Attr2_Normal_Outer::NonCacheable.value;
    attr0 | attr1 | attr2 // 0x44_ff_04
}

#[cfg(target_arch = "aarch64")]
pub fn mair_el1_apply() {
    MAIR_EL1.set(mair_value());
}

#[cfg(target_arch = "aarch64")]
pub fn mair_el2_apply() {
    MAIR_EL2.set(mair_value());
}
