//! The ordered list of regions a context maps.

use core::ops::Index;

use arrayvec::ArrayVec;
use log::warn;
use xlat_interface::{MemoryAddr, XlatError, XlatResult, BYTES_1G, BYTES_2M, PAGE_SIZE};

use crate::Region;

/// Highest addresses a region may touch, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub va: usize,
    pub pa: usize,
}

/// Fixed-capacity region list.
///
/// Regions are kept sorted by end virtual address. Among regions sharing an
/// end address the smaller comes first, so that a region fully inside
/// another is mapped before it.
pub struct Registry<const N: usize> {
    regions: ArrayVec<Region, N>,
}

impl<const N: usize> Registry<N> {
    pub const fn new() -> Self {
        Self {
            regions: ArrayVec::new_const(),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    /// Checks whether `region` could be added. `region.size` must not be zero.
    pub fn check(&self, region: &Region, limits: Limits) -> XlatResult {
        let va = region.va.as_usize();
        let pa = region.pa.as_usize();

        if !region.va.is_aligned_4k() || !region.pa.is_aligned_4k() || region.size % PAGE_SIZE != 0
        {
            return Err(XlatError::InvalidArgument);
        }
        if !matches!(region.granularity, BYTES_1G | BYTES_2M | PAGE_SIZE) {
            return Err(XlatError::InvalidArgument);
        }

        let end_va = va
            .checked_add(region.size - 1)
            .ok_or(XlatError::OutOfRange)?;
        let end_pa = pa
            .checked_add(region.size - 1)
            .ok_or(XlatError::OutOfRange)?;
        if end_va > limits.va || end_pa > limits.pa {
            return Err(XlatError::OutOfRange);
        }

        if self.regions.is_full() {
            return Err(XlatError::OutOfMemory);
        }

        for other in self.regions.iter() {
            if conflicts(region, other) {
                warn!("region {} conflicts with {}", region, other);
                return Err(XlatError::PermissionDenied);
            }
        }
        Ok(())
    }

    /// Inserts an already checked region and returns its position.
    pub fn insert(&mut self, region: Region) -> XlatResult<usize> {
        let end = region.end_va();
        let mut pos = 0;
        while pos < self.regions.len() && self.regions[pos].end_va() < end {
            pos += 1;
        }
        while pos < self.regions.len()
            && self.regions[pos].end_va() == end
            && self.regions[pos].size < region.size
        {
            pos += 1;
        }
        self.regions
            .try_insert(pos, region)
            .map_err(|_| XlatError::OutOfMemory)?;
        Ok(pos)
    }

    /// Finds the region starting at `va` with exactly `size` bytes.
    pub fn position(&self, va: usize, size: usize) -> Option<usize> {
        self.regions
            .iter()
            .position(|r| r.va.as_usize() == va && r.size == size)
    }

    pub fn remove(&mut self, index: usize) -> Region {
        self.regions.remove(index)
    }
}

impl<const N: usize> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Index<usize> for Registry<N> {
    type Output = Region;

    fn index(&self, index: usize) -> &Region {
        &self.regions[index]
    }
}

/// Whether `a` and `b` may not live in the same context.
///
/// A region nested inside another is accepted only when neither is dynamic,
/// both translate with the same offset and they are not the same range.
/// Otherwise the virtual and physical ranges must both be disjoint.
fn conflicts(a: &Region, b: &Region) -> bool {
    let (a_va, a_end_va) = (a.va.as_usize(), a.end_va());
    let (b_va, b_end_va) = (b.va.as_usize(), b.end_va());

    let nested = (a_va >= b_va && a_end_va <= b_end_va) || (b_va >= a_va && b_end_va <= a_end_va);
    if nested {
        a.dynamic
            || b.dynamic
            || a.va_pa_offset() != b.va_pa_offset()
            || (a_va == b_va && a.size == b.size)
    } else {
        let va_apart = a_end_va < b_va || a_va > b_end_va;
        let pa_apart = a.end_pa() < b.pa.as_usize() || a.pa.as_usize() > b.end_pa();
        !(va_apart && pa_apart)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use xlat_interface::{pa, va, MemAttr};

    const LIMITS: Limits = Limits {
        va: (1 << 32) - 1,
        pa: (1 << 32) - 1,
    };

    fn region(pa: usize, va: usize, size: usize) -> Region {
        Region::new(pa!(pa), va!(va), size, MemAttr::RW_DATA)
    }

    fn add<const N: usize>(reg: &mut Registry<N>, r: Region) -> XlatResult<usize> {
        reg.check(&r, LIMITS)?;
        reg.insert(r)
    }

    #[test]
    fn test_alignment() {
        let reg = Registry::<4>::new();
        assert_eq!(
            reg.check(&region(0x1000, 0x1800, 0x1000), LIMITS),
            Err(XlatError::InvalidArgument)
        );
        assert_eq!(
            reg.check(&region(0x1000, 0x1000, 0x1800), LIMITS),
            Err(XlatError::InvalidArgument)
        );
        assert_eq!(
            reg.check(&region(0x1000, 0x1000, 0x1000).with_granularity(0x10000), LIMITS),
            Err(XlatError::InvalidArgument)
        );
    }

    #[test]
    fn test_limits() {
        let reg = Registry::<4>::new();
        assert_eq!(
            reg.check(&region(0, 0xffff_f000, 0x2000), LIMITS),
            Err(XlatError::OutOfRange)
        );
        assert_eq!(
            reg.check(&region(0xffff_f000, 0, 0x2000), LIMITS),
            Err(XlatError::OutOfRange)
        );
        assert_eq!(
            reg.check(&region(0, usize::MAX & !0xfff, 0x2000), LIMITS),
            Err(XlatError::OutOfRange)
        );
        assert!(reg.check(&region(0, 0xffff_e000, 0x2000), LIMITS).is_ok());
    }

    #[test]
    fn test_full() {
        let mut reg = Registry::<2>::new();
        add(&mut reg, region(0x1000, 0x1000, 0x1000)).unwrap();
        add(&mut reg, region(0x3000, 0x3000, 0x1000)).unwrap();
        assert_eq!(
            add(&mut reg, region(0x5000, 0x5000, 0x1000)),
            Err(XlatError::OutOfMemory)
        );
    }

    #[test]
    fn test_overlap() {
        let mut reg = Registry::<8>::new();
        add(&mut reg, region(0x4000_0000, 0x4000_0000, 0x20_0000)).unwrap();

        // nested, same offset
        assert!(add(&mut reg, region(0x4000_1000, 0x4000_1000, 0x1000)).is_ok());
        // nested, other offset
        assert_eq!(
            add(&mut reg, region(0x8000_2000, 0x4000_2000, 0x1000)),
            Err(XlatError::PermissionDenied)
        );
        // identical
        assert_eq!(
            add(&mut reg, region(0x4000_0000, 0x4000_0000, 0x20_0000)),
            Err(XlatError::PermissionDenied)
        );
        // partial overlap
        assert_eq!(
            add(&mut reg, region(0x401f_f000, 0x401f_f000, 0x2000)),
            Err(XlatError::PermissionDenied)
        );
        // disjoint VA, overlapping PA
        assert_eq!(
            add(&mut reg, region(0x4010_0000, 0x1000_0000, 0x1000)),
            Err(XlatError::PermissionDenied)
        );
        // nested, dynamic
        let mut dynamic = region(0x4000_3000, 0x4000_3000, 0x1000);
        dynamic.dynamic = true;
        assert_eq!(add(&mut reg, dynamic), Err(XlatError::PermissionDenied));
    }

    #[test]
    fn test_order() {
        let mut reg = Registry::<8>::new();
        add(&mut reg, region(0x10_0000, 0x10_0000, 0x10_0000)).unwrap();
        add(&mut reg, region(0x1000, 0x1000, 0x1000)).unwrap();
        // same end as the first, smaller: goes first
        add(&mut reg, region(0x1f_f000, 0x1f_f000, 0x1000)).unwrap();
        add(&mut reg, region(0x8000_0000, 0x8000_0000, 0x1000)).unwrap();

        let starts: [usize; 4] = core::array::from_fn(|i| reg[i].va.as_usize());
        assert_eq!(starts, [0x1000, 0x1f_f000, 0x10_0000, 0x8000_0000]);
        assert_eq!(reg.position(0x1f_f000, 0x1000), Some(1));
        assert_eq!(reg.position(0x1f_f000, 0x2000), None);
    }
}
