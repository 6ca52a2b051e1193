use core::fmt::{self, Display};

bitflags::bitflags! {
    /// Attributes of a memory region, independent of the descriptor format.
    ///
    /// Normal write-back cacheable memory is the default type; `DEVICE` and
    /// `NON_CACHEABLE` select the other two. Regions are always readable and
    /// privileged, secure and executable unless a flag says otherwise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemAttr: u32 {
        const DEVICE = 1 << 0;
        const NON_CACHEABLE = 1 << 1;
        const RW = 1 << 3;
        /// Non-secure physical address space.
        const NS = 1 << 4;
        const EXECUTE_NEVER = 1 << 5;
        /// Accessible from EL0. Only meaningful in the EL1&0 regime.
        const USER = 1 << 6;
    }
}

impl MemAttr {
    pub const CODE: Self = Self::empty();
    pub const RO_DATA: Self = Self::EXECUTE_NEVER;
    pub const RW_DATA: Self = Self::RW.union(Self::EXECUTE_NEVER);
    pub const DEVICE_RW: Self = Self::DEVICE.union(Self::RW_DATA);

    /// The flags `set_region_attributes` is allowed to change.
    pub const PERMISSIONS: Self = Self::RW.union(Self::EXECUTE_NEVER).union(Self::USER);

    pub const fn mem_type(&self) -> MemType {
        if self.contains(Self::DEVICE) {
            MemType::Device
        } else if self.contains(Self::NON_CACHEABLE) {
            MemType::NonCacheable
        } else {
            MemType::Normal
        }
    }
}

impl Display for MemAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match self.mem_type() {
            MemType::Device => "DEV",
            MemType::NonCacheable => "NC",
            MemType::Normal => "MEM",
        };
        let rw = if self.contains(Self::RW) { "RW" } else { "RO" };
        let xn = if self.contains(Self::EXECUTE_NEVER) { "XN" } else { "EXEC" };
        let el = if self.contains(Self::USER) { "USER" } else { "PRIV" };
        let ns = if self.contains(Self::NS) { "NS" } else { "S" };
        write!(f, "{ty}-{rw}-{xn}-{el}-{ns}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemType {
    Device,
    NonCacheable,
    Normal,
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_mem_type() {
        assert_eq!(MemAttr::CODE.mem_type(), MemType::Normal);
        assert_eq!(MemAttr::DEVICE_RW.mem_type(), MemType::Device);
        assert_eq!(
            (MemAttr::NON_CACHEABLE | MemAttr::RW).mem_type(),
            MemType::NonCacheable
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(MemAttr::RW_DATA.to_string(), "MEM-RW-XN-PRIV-S");
        assert_eq!(
            (MemAttr::DEVICE_RW | MemAttr::NS).to_string(),
            "DEV-RW-XN-PRIV-NS"
        );
    }
}
