//! Mutable view of a context's tables used by the mapping walks.

use core::marker::PhantomData;

use xlat_interface::{ArchOps, DescriptorCodec, Regime};

use crate::pool::{index_of, RegionCounts, Table};

/// A table reachable from a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableId {
    Root,
    Pool(usize),
}

/// The tables of a context split into independently borrowed parts.
pub(crate) struct Tree<'a, C, A, const N: usize> {
    pub root: &'a mut Table,
    pub tables: &'a mut [Table; N],
    pub counts: &'a RegionCounts<N>,
    pub arch: &'a A,
    pub regime: Regime,
    pub base_level: usize,
    pub base_entries: usize,
    pub _codec: PhantomData<C>,
}

impl<C: DescriptorCodec, A: ArchOps, const N: usize> Tree<'_, C, A, N> {
    pub fn entries(&self, id: TableId) -> &[u64] {
        match id {
            TableId::Root => &self.root.0[..self.base_entries],
            TableId::Pool(i) => &self.tables[i].0,
        }
    }

    pub fn entries_mut(&mut self, id: TableId) -> &mut [u64] {
        match id {
            TableId::Root => &mut self.root.0[..self.base_entries],
            TableId::Pool(i) => &mut self.tables[i].0,
        }
    }

    pub fn table_addr(&self, index: usize) -> usize {
        self.tables[index].addr()
    }

    /// Pool index of the table a table descriptor points at.
    pub fn child_of(&self, desc: u64) -> usize {
        let addr = C::output_address(desc).as_usize();
        index_of(&self.tables[..], addr)
            .unwrap_or_else(|| panic!("table descriptor {desc:#x} points outside the pool"))
    }

    /// Writes back the whole table so a walker with caches off sees it.
    pub fn clean_table(&self, id: TableId) {
        let entries = self.entries(id);
        self.arch.clean_dcache_range(
            entries.as_ptr() as usize,
            core::mem::size_of_val(entries),
        );
    }
}
