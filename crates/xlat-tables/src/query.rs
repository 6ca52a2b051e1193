use log::warn;
use xlat_interface::{
    block_shift, block_size, table_index, ArchOps, DescKind, DescriptorCodec, MemAttr, MemType,
    MemoryAddr, PhysAddr, VirtAddr, XlatError, XlatResult, MAX_LEVEL, PAGE_SIZE,
};

use crate::tree::TableId;
use crate::Context;

/// Result of walking the tables for one virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub pa: PhysAddr,
    pub attrs: MemAttr,
    /// Level of the leaf descriptor.
    pub level: usize,
    /// Bytes mapped by the leaf descriptor.
    pub block_size: usize,
}

/// A leaf descriptor found by a walk.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    table: TableId,
    index: usize,
    level: usize,
    desc: u64,
}

impl<C, A, const REGIONS: usize, const TABLES: usize> Context<C, A, REGIONS, TABLES>
where
    C: DescriptorCodec,
    A: ArchOps,
{
    pub(crate) fn entries(&self, id: TableId) -> &[u64] {
        match id {
            TableId::Root => &self.root.0[..self.base_entries],
            TableId::Pool(i) => &self.pool.table(i).0,
        }
    }

    fn entries_mut(&mut self, id: TableId) -> &mut [u64] {
        match id {
            TableId::Root => &mut self.root.0[..self.base_entries],
            TableId::Pool(i) => &mut self.pool.table_mut(i).0,
        }
    }

    fn find_leaf(&self, va: usize) -> Option<Leaf> {
        if va > self.limits.va {
            return None;
        }
        let mut table = TableId::Root;
        let mut level = self.base_level;
        let mut index = va >> block_shift(level);
        loop {
            let desc = *self.entries(table).get(index)?;
            match C::kind(desc, level) {
                DescKind::Invalid => return None,
                DescKind::Block => {
                    return Some(Leaf {
                        table,
                        index,
                        level,
                        desc,
                    })
                }
                DescKind::Table => {
                    let addr = C::output_address(desc).as_usize();
                    table = TableId::Pool(self.pool.index_of(addr)?);
                    level += 1;
                    index = table_index(va, level);
                }
            }
        }
    }

    /// Walks the tables for `va`.
    pub fn translate(&self, va: VirtAddr) -> Option<Translation> {
        self.check_anchor();
        let va = va.as_usize();
        let leaf = self.find_leaf(va)?;
        let size = block_size(leaf.level);
        Some(Translation {
            pa: PhysAddr::from(C::output_address(leaf.desc).as_usize() + (va & (size - 1))),
            attrs: C::decode(leaf.desc, self.regime),
            level: leaf.level,
            block_size: size,
        })
    }

    /// Attributes of the mapping that covers `va`.
    pub fn get_region_attributes(&self, va: VirtAddr) -> XlatResult<MemAttr> {
        if !self.initialized {
            warn!("get attributes: translation tables not initialized");
            return Err(XlatError::InvalidArgument);
        }
        self.translate(va)
            .map(|t| t.attrs)
            .ok_or(XlatError::InvalidArgument)
    }

    /// Changes the access permissions of the pages in `[va, va + size)`.
    ///
    /// Only `RW`, `EXECUTE_NEVER` and `USER` are taken from `attrs`. The
    /// tables must be initialized and every page mapped by a page descriptor.
    /// Writable or device memory cannot be made executable.
    pub fn set_region_attributes(&mut self, va: VirtAddr, size: usize, attrs: MemAttr) -> XlatResult {
        if !self.initialized {
            warn!("set attributes: translation tables not initialized");
            return Err(XlatError::InvalidArgument);
        }
        if !va.is_aligned_4k() || size == 0 || size % PAGE_SIZE != 0 {
            warn!("set attributes: bad range {:#x} size {:#x}", va.as_usize(), size);
            return Err(XlatError::InvalidArgument);
        }
        if attrs.contains(MemAttr::RW) && !attrs.contains(MemAttr::EXECUTE_NEVER) {
            warn!("set attributes: writable memory must be execute-never");
            return Err(XlatError::PermissionDenied);
        }
        let start = va.as_usize();
        let end = start.checked_add(size - 1).ok_or(XlatError::OutOfRange)?;
        let pages = (start..=end).step_by(PAGE_SIZE);

        for page in pages.clone() {
            let leaf = self.find_leaf(page).ok_or_else(|| {
                warn!("set attributes: {:#x} is not mapped", page);
                XlatError::InvalidArgument
            })?;
            if leaf.level != MAX_LEVEL {
                warn!("set attributes: {:#x} is mapped by a level {} block", page, leaf.level);
                return Err(XlatError::InvalidArgument);
            }
            if C::decode(leaf.desc, self.regime).mem_type() == MemType::Device
                && !attrs.contains(MemAttr::EXECUTE_NEVER)
            {
                warn!("set attributes: device memory at {:#x} must be execute-never", page);
                return Err(XlatError::PermissionDenied);
            }
        }

        self.check_anchor();
        for page in pages {
            let Some(leaf) = self.find_leaf(page) else {
                continue;
            };
            let old = C::decode(leaf.desc, self.regime);
            let new = C::effective(
                old.difference(MemAttr::PERMISSIONS) | attrs.intersection(MemAttr::PERMISSIONS),
                self.regime,
            );
            let desc = C::block(new, C::output_address(leaf.desc), leaf.level, self.regime);
            self.replace_entry(leaf, desc, page);
        }
        self.arch.store_barrier();
        Ok(())
    }

    /// Replaces a live descriptor with break-before-make.
    fn replace_entry(&mut self, leaf: Leaf, desc: u64, va: usize) {
        let slot = &mut self.entries_mut(leaf.table)[leaf.index];
        *slot = C::INVALID;
        let addr = slot as *mut u64 as usize;
        self.arch.clean_dcache_range(addr, 8);
        self.arch.store_barrier();
        self.arch.invalidate_va(VirtAddr::from(va), self.regime);
        self.arch.invalidate_sync();

        self.entries_mut(leaf.table)[leaf.index] = desc;
        self.arch.clean_dcache_range(addr, 8);
    }
}
